use std::sync::Arc;

use super::*;
use crate::chunking::Chunk;
use crate::config::MAX_TOP_K;
use crate::providers::EmbeddingModel;

struct AxisEmbedder;

impl EmbeddingModel for AxisEmbedder {
    fn model_id(&self) -> &str {
        "axis-test"
    }

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let lower = text.to_lowercase();
        Ok(if lower.contains("alice") {
            vec![1.0, 0.0]
        } else {
            vec![0.0, 1.0]
        })
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
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

async fn test_index() -> EmbeddingIndex {
    EmbeddingIndex::build_in_memory(
        &[
            chunk(0, "Alice is 30 years old."),
            chunk(1, "Bob is 25 years old."),
        ],
        Arc::new(AxisEmbedder),
    )
    .await
    .expect("build index")
}

#[tokio::test]
async fn top_k_out_of_range_fails_at_construction() {
    let index = test_index().await;
    assert!(matches!(
        Retriever::new(index, 0),
        Err(PdfChatError::Config(_))
    ));

    let index = test_index().await;
    assert!(matches!(
        Retriever::new(index, MAX_TOP_K + 1),
        Err(PdfChatError::Config(_))
    ));

    let index = test_index().await;
    assert!(Retriever::new(index, MAX_TOP_K).is_ok());
}

#[tokio::test]
async fn retrieve_bounds_results_to_top_k() {
    let retriever = Retriever::new(test_index().await, 1).expect("build retriever");

    let hits = retriever.retrieve("How old is Alice?").await.expect("retrieve");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk_id, 0);
}

#[tokio::test]
async fn retrieve_orders_by_similarity() {
    let retriever = Retriever::new(test_index().await, 2).expect("build retriever");

    let hits = retriever.retrieve("How old is Bob?").await.expect("retrieve");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].chunk_id, 1);
    assert!(hits[0].score >= hits[1].score);
}
