#[cfg(test)]
mod tests;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::chat::{AnswerResult, ConversationEngine, MemoryBuffer};
use crate::chunking::{SplitConfig, split_pages};
use crate::config::Config;
use crate::index::{EmbeddingIndex, IndexOptions};
use crate::loader::load_corpus;
use crate::providers::{ChatMessage, EmbeddingModel, build_embedder, build_language_model};
use crate::retriever::Retriever;
use crate::{PdfChatError, Result};

/// Corpus statistics gathered during initialization, for the presentation
/// layer's banner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusSummary {
    pub files: usize,
    pub pages: usize,
    pub chunks: usize,
    pub index_entries: usize,
    /// Whether the index was loaded from a persisted collection instead of
    /// rebuilt
    pub loaded_from_disk: bool,
    pub embed_model: String,
    pub chat_model: String,
}

/// The assembled question-answering pipeline: loader → chunker → index →
/// retriever → conversation engine.
pub struct RagPipeline {
    engine: ConversationEngine,
    summary: CorpusSummary,
}

impl std::fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagPipeline")
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}

impl RagPipeline {
    /// Build the full pipeline over the PDFs at `inputs`.
    ///
    /// Fails fast on invalid configuration, missing input paths, a corpus
    /// that yields zero chunks, or a missing cloud API key — all before any
    /// model call for the corpus itself.
    #[inline]
    pub async fn initialize(config: &Config, inputs: &[PathBuf], rebuild: bool) -> Result<Self> {
        config
            .validate()
            .map_err(|e| PdfChatError::Config(e.to_string()))?;

        let pages = load_corpus(inputs)?;
        let files: BTreeSet<&str> = pages.iter().map(|p| p.source_file.as_str()).collect();
        info!("Corpus: {} pages across {} file(s)", pages.len(), files.len());

        let split_config = SplitConfig {
            chunk_size: config.chunking.chunk_size,
            overlap: config.chunking.overlap,
        };
        let chunks = split_pages(&pages, &split_config)?;
        if chunks.is_empty() {
            return Err(PdfChatError::EmptyCorpus);
        }

        // The chat backend is constructed before the (potentially expensive)
        // index build so a missing API key fails before any embedding work.
        let llm = build_language_model(config)?;

        let embedder = build_embedder(config)?;
        if let Err(e) = embedder.ping() {
            warn!("Ollama server not reachable yet: {e:#}");
        }

        let index = EmbeddingIndex::open(
            Some(&config.storage.persist_dir),
            &chunks,
            Arc::clone(&embedder) as Arc<dyn EmbeddingModel>,
            IndexOptions {
                force_rebuild: rebuild,
            },
        )
        .await?;

        let summary = CorpusSummary {
            files: files.len(),
            pages: pages.len(),
            chunks: chunks.len(),
            index_entries: index.entry_count(),
            loaded_from_disk: index.loaded_from_disk(),
            embed_model: index.embed_model_id().to_string(),
            chat_model: llm.model_id().to_string(),
        };

        let retriever = Retriever::new(index, config.retrieval.top_k)?;
        let memory = MemoryBuffer::new(config.memory.token_limit);
        let engine = ConversationEngine::new(retriever, memory, llm);

        info!(
            "Pipeline ready: {} chunks indexed ({})",
            summary.index_entries,
            if summary.loaded_from_disk {
                "loaded from disk"
            } else {
                "rebuilt"
            }
        );

        Ok(Self { engine, summary })
    }

    /// Answer one question; errors are per-turn and leave the pipeline
    /// usable for the next question.
    #[inline]
    pub async fn ask(&mut self, question: &str) -> Result<AnswerResult> {
        self.engine.ask(question).await
    }

    #[inline]
    pub fn clear_memory(&mut self) {
        self.engine.clear_memory();
    }

    #[inline]
    pub fn history(&self) -> Vec<ChatMessage> {
        self.engine.history()
    }

    #[inline]
    pub fn summary(&self) -> &CorpusSummary {
        &self.summary
    }
}
