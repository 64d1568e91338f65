#[cfg(test)]
mod tests;

use tracing::debug;

use crate::config::MAX_TOP_K;
use crate::index::{EmbeddingIndex, SearchHit};
use crate::{PdfChatError, Result};

/// Fixed top-k retrieval policy over an [`EmbeddingIndex`].
///
/// The index owns the embedding model handle, so every query is embedded
/// with the same model that produced the stored vectors.
pub struct Retriever {
    index: EmbeddingIndex,
    top_k: usize,
}

impl Retriever {
    /// Bind an index to a top-k value. `top_k` is validated here, at
    /// construction, not at call time.
    #[inline]
    pub fn new(index: EmbeddingIndex, top_k: usize) -> Result<Self> {
        if !(1..=MAX_TOP_K).contains(&top_k) {
            return Err(PdfChatError::Config(format!(
                "top_k must be between 1 and {MAX_TOP_K}, got {top_k}"
            )));
        }
        Ok(Self { index, top_k })
    }

    /// Retrieve the `top_k` most similar chunks for `query`, ordered by
    /// descending similarity. An empty result is valid: it means nothing in
    /// the corpus resembles the query.
    #[inline]
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchHit>> {
        debug!("Retrieving top {} chunks for query", self.top_k);
        let hits = self.index.search(query, self.top_k).await?;
        debug!("Retrieved {} chunks", hits.len());
        Ok(hits)
    }

    #[inline]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    #[inline]
    pub fn index(&self) -> &EmbeddingIndex {
        &self.index
    }
}
