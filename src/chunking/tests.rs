use super::estimate_token_count as estimate_token_count_impl;
use super::*;

fn page(text: &str) -> PageText {
    PageText {
        text: text.to_string(),
        source_file: "report.pdf".to_string(),
        page_label: "1".to_string(),
    }
}

fn long_page(sentences: usize) -> PageText {
    page(&"The quarterly revenue grew by twelve percent over the prior period. ".repeat(sentences))
}

#[test]
fn estimate_token_count() {
    assert_eq!(estimate_token_count_impl("hello world"), 2);
    assert_eq!(estimate_token_count_impl("This is a test."), 5);
    assert_eq!(estimate_token_count_impl(""), 0);
}

#[test]
fn small_page_is_single_chunk() {
    let pages = [page("A short paragraph that easily fits in one chunk.")];
    let config = SplitConfig::default();

    let chunks = split_pages(&pages, &config).expect("split_pages should succeed");

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, pages[0].text);
    assert_eq!(chunks[0].chunk_id, 0);
}

#[test]
fn chunk_size_bound_holds() {
    let pages = [long_page(200)];
    let config = SplitConfig {
        chunk_size: 80,
        overlap: 20,
    };

    let chunks = split_pages(&pages, &config).expect("split_pages should succeed");

    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(
            estimate_token_count_impl(&chunk.text) <= config.chunk_size,
            "chunk {} has {} tokens, budget is {}",
            chunk.chunk_id,
            estimate_token_count_impl(&chunk.text),
            config.chunk_size
        );
    }
}

#[test]
fn consecutive_chunks_share_overlap() {
    let pages = [long_page(200)];
    let config = SplitConfig {
        chunk_size: 80,
        overlap: 20,
    };

    let chunks = split_pages(&pages, &config).expect("split_pages should succeed");

    assert!(chunks.len() > 2);
    for pair in chunks.windows(2) {
        let seed = super::overlap_suffix(&pair[0].text, config.overlap);
        assert!(!seed.is_empty());
        assert!(
            pair[1].text.starts_with(&seed),
            "chunk {} does not start with the tail of chunk {}",
            pair[1].chunk_id,
            pair[0].chunk_id
        );
    }
}

#[test]
fn chunks_end_on_sentence_boundaries() {
    let pages = [long_page(100)];
    let config = SplitConfig {
        chunk_size: 100,
        overlap: 0,
    };

    let chunks = split_pages(&pages, &config).expect("split_pages should succeed");

    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(chunk.text.ends_with('.'));
    }
}

#[test]
fn metadata_preserved_per_page() {
    let pages = [
        PageText {
            text: "Alpha content on the first page. ".repeat(60),
            source_file: "a.pdf".to_string(),
            page_label: "1".to_string(),
        },
        PageText {
            text: "Beta content on the second page. ".repeat(60),
            source_file: "b.pdf".to_string(),
            page_label: "7".to_string(),
        },
    ];
    let config = SplitConfig {
        chunk_size: 60,
        overlap: 10,
    };

    let chunks = split_pages(&pages, &config).expect("split_pages should succeed");

    for chunk in &chunks {
        if chunk.text.contains("Alpha") {
            assert_eq!(chunk.source_file, "a.pdf");
            assert_eq!(chunk.page_label, "1");
        } else {
            assert_eq!(chunk.source_file, "b.pdf");
            assert_eq!(chunk.page_label, "7");
        }
    }
}

#[test]
fn chunk_ids_are_sequential_across_pages() {
    let pages = [long_page(100), long_page(100)];
    let config = SplitConfig {
        chunk_size: 60,
        overlap: 10,
    };

    let chunks = split_pages(&pages, &config).expect("split_pages should succeed");

    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_id, u32::try_from(i).expect("fits in u32"));
    }
}

#[test]
fn chunks_never_span_pages() {
    let pages = [
        PageText {
            text: "Only alpha words here. ".repeat(40),
            source_file: "doc.pdf".to_string(),
            page_label: "1".to_string(),
        },
        PageText {
            text: "Only beta words here. ".repeat(40),
            source_file: "doc.pdf".to_string(),
            page_label: "2".to_string(),
        },
    ];
    let config = SplitConfig {
        chunk_size: 50,
        overlap: 15,
    };

    let chunks = split_pages(&pages, &config).expect("split_pages should succeed");

    for chunk in &chunks {
        assert!(!(chunk.text.contains("alpha") && chunk.text.contains("beta")));
    }
}

#[test]
fn oversized_sentence_falls_back_to_word_cut() {
    // One giant "sentence" with no terminal punctuation until the end.
    let words = "lorem ipsum dolor sit amet consectetur adipiscing elit ".repeat(100);
    let pages = [page(&format!("{words}."))];
    let config = SplitConfig {
        chunk_size: 50,
        overlap: 0,
    };

    let chunks = split_pages(&pages, &config).expect("split_pages should succeed");

    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(estimate_token_count_impl(&chunk.text) <= config.chunk_size);
    }
}

#[test]
fn overlap_must_be_smaller_than_chunk_size() {
    let pages = [page("Some text.")];
    let config = SplitConfig {
        chunk_size: 100,
        overlap: 100,
    };

    let err = split_pages(&pages, &config).expect_err("equal overlap should be rejected");
    assert!(matches!(err, crate::PdfChatError::Config(_)));
}

#[test]
fn zero_chunk_size_rejected() {
    let pages = [page("Some text.")];
    let config = SplitConfig {
        chunk_size: 0,
        overlap: 0,
    };

    let err = split_pages(&pages, &config).expect_err("zero chunk_size should be rejected");
    assert!(matches!(err, crate::PdfChatError::Config(_)));
}

#[test]
fn whitespace_pages_produce_no_chunks() {
    let pages = [page("   \n\n  ")];
    let config = SplitConfig::default();

    let chunks = split_pages(&pages, &config).expect("split_pages should succeed");
    assert!(chunks.is_empty());
}

#[test]
fn token_counts_match_chunk_text() {
    let pages = [long_page(120)];
    let config = SplitConfig {
        chunk_size: 70,
        overlap: 20,
    };

    let chunks = split_pages(&pages, &config).expect("split_pages should succeed");

    for chunk in &chunks {
        assert_eq!(chunk.token_count, estimate_token_count_impl(&chunk.text));
    }
}
