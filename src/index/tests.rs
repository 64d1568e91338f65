use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::TempDir;

use super::*;
use crate::chunking::Chunk;
use crate::providers::EmbeddingModel;

/// Deterministic embedder with a call counter, standing in for Ollama.
/// Vectors depend only on the text, so reload comparisons are exact.
struct ScriptedEmbedder {
    model: String,
    batch_calls: Arc<AtomicUsize>,
}

impl ScriptedEmbedder {
    fn new(model: &str) -> (Arc<Self>, Arc<AtomicUsize>) {
        let batch_calls = Arc::new(AtomicUsize::new(0));
        let embedder = Arc::new(Self {
            model: model.to_string(),
            batch_calls: Arc::clone(&batch_calls),
        });
        (embedder, batch_calls)
    }

    fn vector_for(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        if lower.contains("alice") {
            vec![1.0, 0.0, 0.1]
        } else if lower.contains("bob") {
            vec![0.0, 1.0, 0.1]
        } else {
            vec![0.1, 0.1, 1.0]
        }
    }
}

impl EmbeddingModel for ScriptedEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(Self::vector_for(text))
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
    }
}

fn chunk(chunk_id: u32, text: &str) -> Chunk {
    Chunk {
        chunk_id,
        text: text.to_string(),
        source_file: "people.pdf".to_string(),
        page_label: (chunk_id + 1).to_string(),
        token_count: 8,
    }
}

fn corpus() -> Vec<Chunk> {
    vec![
        chunk(0, "Alice is 30 years old."),
        chunk(1, "Bob is 25 years old."),
    ]
}

#[tokio::test]
async fn empty_corpus_fails_loud() {
    let (embedder, _) = ScriptedEmbedder::new("model-a");
    let result = EmbeddingIndex::build_in_memory(&[], embedder).await;
    assert!(matches!(result, Err(PdfChatError::EmptyCorpus)));
}

#[tokio::test]
async fn in_memory_build_and_search() {
    let (embedder, _) = ScriptedEmbedder::new("model-a");
    let index = EmbeddingIndex::build_in_memory(&corpus(), embedder)
        .await
        .expect("build index");

    assert_eq!(index.entry_count(), 2);
    assert!(!index.loaded_from_disk());

    let hits = index.search("How old is Alice?", 1).await.expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk_id, 0);
    assert!(hits[0].text.contains("Alice"));
}

#[tokio::test]
async fn no_persist_dir_builds_in_memory() {
    let (embedder, batch_calls) = ScriptedEmbedder::new("model-a");
    let index = EmbeddingIndex::open(None, &corpus(), embedder, IndexOptions::default())
        .await
        .expect("open index");

    assert!(!index.loaded_from_disk());
    assert_eq!(batch_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn persisted_collection_is_reused_without_reembedding() {
    let dir = TempDir::new().expect("tempdir");

    let (embedder, batch_calls) = ScriptedEmbedder::new("model-a");
    let first = EmbeddingIndex::open(
        Some(dir.path()),
        &corpus(),
        embedder,
        IndexOptions::default(),
    )
    .await
    .expect("build index");
    assert!(!first.loaded_from_disk());
    assert_eq!(batch_calls.load(Ordering::SeqCst), 1);

    let query_hits = first.search("How old is Bob?", 2).await.expect("search");

    let (embedder, batch_calls) = ScriptedEmbedder::new("model-a");
    let second = EmbeddingIndex::open(
        Some(dir.path()),
        &corpus(),
        embedder,
        IndexOptions::default(),
    )
    .await
    .expect("reload index");

    assert!(second.loaded_from_disk());
    assert_eq!(second.entry_count(), 2);
    // The dominant cost-saving path: loading never re-embeds the corpus.
    assert_eq!(batch_calls.load(Ordering::SeqCst), 0);

    // Reload is idempotent: same hits, same order, for the same query.
    let reloaded_hits = second.search("How old is Bob?", 2).await.expect("search");
    let ids: Vec<u32> = reloaded_hits.iter().map(|h| h.chunk_id).collect();
    let first_ids: Vec<u32> = query_hits.iter().map(|h| h.chunk_id).collect();
    assert_eq!(ids, first_ids);
}

#[tokio::test]
async fn model_mismatch_triggers_rebuild() {
    let dir = TempDir::new().expect("tempdir");

    let (embedder, _) = ScriptedEmbedder::new("model-a");
    EmbeddingIndex::open(
        Some(dir.path()),
        &corpus(),
        embedder,
        IndexOptions::default(),
    )
    .await
    .expect("build index");

    let (embedder, batch_calls) = ScriptedEmbedder::new("model-b");
    let reopened = EmbeddingIndex::open(
        Some(dir.path()),
        &corpus(),
        embedder,
        IndexOptions::default(),
    )
    .await
    .expect("reopen with different model");

    // Never silently served from the old vector space.
    assert!(!reopened.loaded_from_disk());
    assert_eq!(batch_calls.load(Ordering::SeqCst), 1);
    assert_eq!(reopened.embed_model_id(), "model-b");
}

#[tokio::test]
async fn force_rebuild_skips_the_load_path() {
    let dir = TempDir::new().expect("tempdir");

    let (embedder, _) = ScriptedEmbedder::new("model-a");
    EmbeddingIndex::open(
        Some(dir.path()),
        &corpus(),
        embedder,
        IndexOptions::default(),
    )
    .await
    .expect("build index");

    let (embedder, batch_calls) = ScriptedEmbedder::new("model-a");
    let rebuilt = EmbeddingIndex::open(
        Some(dir.path()),
        &corpus(),
        embedder,
        IndexOptions {
            force_rebuild: true,
        },
    )
    .await
    .expect("force rebuild");

    assert!(!rebuilt.loaded_from_disk());
    assert_eq!(batch_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unusable_persist_dir_falls_back_to_memory() {
    let dir = TempDir::new().expect("tempdir");
    let blocked = dir.path().join("blocked");
    std::fs::write(&blocked, b"not a directory").expect("write file");

    let (embedder, _) = ScriptedEmbedder::new("model-a");
    let index = EmbeddingIndex::open(
        Some(&blocked),
        &corpus(),
        embedder,
        IndexOptions::default(),
    )
    .await
    .expect("fall back to in-memory index");

    assert!(!index.loaded_from_disk());
    let hits = index.search("Alice", 1).await.expect("search");
    assert_eq!(hits[0].chunk_id, 0);
}

#[test]
fn normalization_produces_unit_vectors() {
    let mut vector = vec![3.0, 4.0];
    l2_normalize(&mut vector);
    assert!((dot(&vector, &vector) - 1.0).abs() < 1e-6);

    // Zero vectors stay untouched instead of dividing by zero.
    let mut zero = vec![0.0, 0.0];
    l2_normalize(&mut zero);
    assert_eq!(zero, vec![0.0, 0.0]);
}
