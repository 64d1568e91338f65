use super::*;
use tempfile::TempDir;

fn entry(chunk_id: u32, vector: Vec<f32>, text: &str) -> IndexEntry {
    IndexEntry {
        chunk_id,
        vector,
        text: text.to_string(),
        source_file: "corpus.pdf".to_string(),
        page_label: "1".to_string(),
    }
}

#[tokio::test]
async fn empty_store_reports_zero_and_no_hits() {
    let dir = TempDir::new().expect("tempdir");
    let store = LanceStore::open(dir.path()).await.expect("open store");

    assert_eq!(store.count().await.expect("count"), 0);
    assert!(store
        .nearest(&[1.0, 0.0, 0.0], 5)
        .await
        .expect("search")
        .is_empty());
}

#[tokio::test]
async fn add_count_and_search_round_trip() {
    let dir = TempDir::new().expect("tempdir");
    let store = LanceStore::open(dir.path()).await.expect("open store");

    store
        .add_entries(&[
            entry(0, vec![1.0, 0.0, 0.0], "alpha"),
            entry(1, vec![0.0, 1.0, 0.0], "beta"),
            entry(2, vec![0.0, 0.0, 1.0], "gamma"),
        ])
        .await
        .expect("add entries");

    assert_eq!(store.count().await.expect("count"), 3);

    let hits = store.nearest(&[0.0, 1.0, 0.0], 2).await.expect("search");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].chunk_id, 1);
    assert_eq!(hits[0].text, "beta");
    assert_eq!(hits[0].source_file, "corpus.pdf");
    assert!((hits[0].score - 1.0).abs() < 1e-5);
    assert!(hits[0].score >= hits[1].score);
}

#[tokio::test]
async fn reopen_preserves_entries() {
    let dir = TempDir::new().expect("tempdir");

    {
        let store = LanceStore::open(dir.path()).await.expect("open store");
        store
            .add_entries(&[entry(0, vec![1.0, 0.0], "persisted")])
            .await
            .expect("add entries");
    }

    let store = LanceStore::open(dir.path()).await.expect("reopen store");
    assert_eq!(store.count().await.expect("count"), 1);

    let hits = store.nearest(&[1.0, 0.0], 1).await.expect("search");
    assert_eq!(hits[0].text, "persisted");
}

#[tokio::test]
async fn clear_drops_the_table() {
    let dir = TempDir::new().expect("tempdir");
    let store = LanceStore::open(dir.path()).await.expect("open store");

    store
        .add_entries(&[entry(0, vec![1.0, 0.0], "ephemeral")])
        .await
        .expect("add entries");
    assert_eq!(store.count().await.expect("count"), 1);

    store.clear().await.expect("clear");
    assert_eq!(store.count().await.expect("count"), 0);

    // Clearing an already-empty store is not an error.
    store.clear().await.expect("clear again");
}

#[tokio::test]
async fn mismatched_entry_dimension_is_an_error() {
    let dir = TempDir::new().expect("tempdir");
    let store = LanceStore::open(dir.path()).await.expect("open store");

    let result = store
        .add_entries(&[
            entry(0, vec![1.0, 0.0], "two dims"),
            entry(1, vec![1.0, 0.0, 0.0], "three dims"),
        ])
        .await;

    assert!(matches!(result, Err(PdfChatError::Store(_))));
}
