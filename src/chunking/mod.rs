#[cfg(test)]
mod tests;

use std::sync::LazyLock;

use fancy_regex::Regex;
use tracing::debug;

use crate::loader::PageText;
use crate::{PdfChatError, Result};

/// Sentence boundary: terminal punctuation followed by whitespace. The
/// lookbehind keeps the punctuation attached to the sentence it closes.
static SENTENCE_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?<=[.!?])\s+").expect("valid regex"));

/// Rough word-to-token ratio for English text
const WORDS_PER_TOKEN: f64 = 0.75;

/// A chunk of corpus text ready for embedding
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Ordinal assigned in build order, unique within one corpus build.
    /// Doubles as the insertion-order tie-breaker during retrieval.
    pub chunk_id: u32,
    /// The chunk text
    pub text: String,
    /// File name of the source document
    pub source_file: String,
    /// Human-facing page label (1-based page number)
    pub page_label: String,
    /// Estimated token count
    pub token_count: usize,
}

/// Configuration for splitting pages into chunks
#[derive(Debug, Clone)]
pub struct SplitConfig {
    /// Maximum chunk size in tokens
    pub chunk_size: usize,
    /// Overlap between consecutive chunks from the same page, in tokens
    pub overlap: usize,
}

impl Default for SplitConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 150,
        }
    }
}

/// Split extracted pages into overlapping, sentence-aligned chunks.
///
/// Chunks never span pages, so every chunk carries exactly one
/// `source_file`/`page_label` pair. Chunk ids are assigned as a running
/// ordinal across the whole corpus.
#[inline]
pub fn split_pages(pages: &[PageText], config: &SplitConfig) -> Result<Vec<Chunk>> {
    if config.chunk_size == 0 {
        return Err(PdfChatError::Config(
            "chunk_size must be greater than 0".to_string(),
        ));
    }
    if config.overlap >= config.chunk_size {
        return Err(PdfChatError::Config(format!(
            "overlap ({}) must be smaller than chunk_size ({})",
            config.overlap, config.chunk_size
        )));
    }

    let mut chunks = Vec::new();
    let mut next_id: u32 = 0;

    for page in pages {
        for text in split_page(&page.text, config) {
            let token_count = estimate_token_count(&text);
            chunks.push(Chunk {
                chunk_id: next_id,
                text,
                source_file: page.source_file.clone(),
                page_label: page.page_label.clone(),
                token_count,
            });
            next_id += 1;
        }
    }

    debug!(
        "Split {} pages into {} chunks (avg {} tokens)",
        pages.len(),
        chunks.len(),
        chunks.iter().map(|c| c.token_count).sum::<usize>() / chunks.len().max(1)
    );

    Ok(chunks)
}

/// Split one page's text into pieces of at most `chunk_size` tokens,
/// preferring sentence boundaries and seeding each piece with the trailing
/// words of its predecessor to form the overlap.
fn split_page(text: &str, config: &SplitConfig) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if estimate_token_count(text) <= config.chunk_size {
        return vec![text.to_string()];
    }

    let mut splitter = PageSplitter::new(config);
    for sentence in split_sentences(text) {
        if estimate_token_count(sentence) > config.chunk_size {
            // No boundary within budget; fall back to a hard word cut.
            for word in sentence.split_whitespace() {
                splitter.push(word);
            }
        } else {
            splitter.push(sentence);
        }
    }
    splitter.finish()
}

/// Accumulates sentences (or words) into chunks without exceeding the token
/// budget. Word and punctuation counts are tracked incrementally so the
/// budget check matches `estimate_token_count` of the final joined text
/// exactly; the estimate is floor-based and not additive across pieces.
struct PageSplitter<'a> {
    config: &'a SplitConfig,
    pieces: Vec<String>,
    current: String,
    words: usize,
    puncts: usize,
}

impl<'a> PageSplitter<'a> {
    fn new(config: &'a SplitConfig) -> Self {
        Self {
            config,
            pieces: Vec::new(),
            current: String::new(),
            words: 0,
            puncts: 0,
        }
    }

    /// Append one unit (sentence or word), closing the current chunk and
    /// seeding the next with overlap text when the unit does not fit.
    fn push(&mut self, unit: &str) {
        let unit_words = unit.split_whitespace().count();
        let unit_puncts = count_puncts(unit);

        if self.fits(unit_words, unit_puncts) {
            self.append(unit, unit_words, unit_puncts);
            return;
        }

        self.close();

        // Shrink the overlap seed when the unit cannot share a chunk with
        // the full seed; the overlap property tolerates snapping here.
        while !self.current.is_empty() && !self.fits(unit_words, unit_puncts) {
            self.drop_leading_seed_word();
        }

        if self.current.is_empty() && estimated(unit_words, unit_puncts) > self.config.chunk_size {
            // A single word over the budget (pathological chunk_size);
            // emit it alone rather than split mid-word.
            self.pieces.push(unit.to_string());
            return;
        }

        self.append(unit, unit_words, unit_puncts);
    }

    fn finish(mut self) -> Vec<String> {
        if !self.current.trim().is_empty() {
            let piece = self.current.trim().to_string();
            self.pieces.push(piece);
        }
        self.pieces
    }

    fn fits(&self, unit_words: usize, unit_puncts: usize) -> bool {
        estimated(self.words + unit_words, self.puncts + unit_puncts) <= self.config.chunk_size
    }

    fn append(&mut self, unit: &str, unit_words: usize, unit_puncts: usize) {
        if !self.current.is_empty() {
            self.current.push(' ');
        }
        self.current.push_str(unit);
        self.words += unit_words;
        self.puncts += unit_puncts;
    }

    /// Close the chunk under construction and seed the next one with the
    /// trailing overlap words of the closed chunk.
    fn close(&mut self) {
        if !self.current.trim().is_empty() {
            let piece = self.current.trim().to_string();
            self.pieces.push(piece);
        }
        let seed = self
            .pieces
            .last()
            .map_or_else(String::new, |piece| overlap_suffix(piece, self.config.overlap));
        self.words = seed.split_whitespace().count();
        self.puncts = count_puncts(&seed);
        self.current = seed;
    }

    fn drop_leading_seed_word(&mut self) {
        match self.current.split_once(char::is_whitespace) {
            Some((dropped, rest)) => {
                self.words -= 1;
                self.puncts -= count_puncts(dropped);
                self.current = rest.trim_start().to_string();
            }
            None => {
                self.words = 0;
                self.puncts = 0;
                self.current.clear();
            }
        }
    }
}

/// Split text on sentence boundaries, keeping punctuation with each sentence
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for mat in SENTENCE_BOUNDARY.find_iter(text).flatten() {
        if let Some(sentence) = text.get(start..mat.start()) {
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
        }
        start = mat.end();
    }
    if let Some(sentence) = text.get(start..) {
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
    }

    sentences
}

/// Extract the trailing words of a chunk worth roughly `overlap_tokens`
fn overlap_suffix(text: &str, overlap_tokens: usize) -> String {
    let word_count = (overlap_tokens as f64 * WORDS_PER_TOKEN) as usize;
    if word_count == 0 {
        return String::new();
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= word_count {
        // Chunk is smaller than the overlap window; carrying it forward
        // whole would duplicate the entire chunk.
        return String::new();
    }

    words[words.len() - word_count..].join(" ")
}

fn count_puncts(text: &str) -> usize {
    text.chars().filter(|c| c.is_ascii_punctuation()).count()
}

fn estimated(words: usize, puncts: usize) -> usize {
    (puncts as f64).mul_add(0.1, words as f64 / WORDS_PER_TOKEN) as usize
}

/// Estimate token count using a simple heuristic
/// This is a rough approximation - actual tokenization would be more accurate
#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    // Rough heuristic: 1 token ≈ 0.75 words for English text
    // Add extra tokens for punctuation and special characters
    let word_count = text.split_whitespace().count();
    let punct_count = count_puncts(text);

    estimated(word_count, punct_count)
}
