
use std::sync::Mutex;

use async_trait::async_trait;

use crate::index::{IndexEntry, SearchHit, VectorStore, dot, sort_hits};
use crate::{PdfChatError, Result};

/// Brute-force in-memory vector store.
///
/// Serves as the fallback when durable storage is unavailable and as the
/// test double for the durable backend. Entries are scanned linearly per
/// query, which is fine at single-corpus scale.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<IndexEntry>>,
}

impl MemoryStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn add_entries(&self, entries: &[IndexEntry]) -> Result<()> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| PdfChatError::Store("memory store poisoned".to_string()))?;
        guard.extend_from_slice(entries);
        Ok(())
    }

    async fn nearest(&self, query_vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| PdfChatError::Store("memory store poisoned".to_string()))?;

        let mut hits = Vec::with_capacity(guard.len());
        for entry in guard.iter() {
            if entry.vector.len() != query_vector.len() {
                return Err(PdfChatError::Store(format!(
                    "query dimension {} does not match stored dimension {}",
                    query_vector.len(),
                    entry.vector.len()
                )));
            }
            hits.push(SearchHit {
                chunk_id: entry.chunk_id,
                text: entry.text.clone(),
                source_file: entry.source_file.clone(),
                page_label: entry.page_label.clone(),
                score: dot(&entry.vector, query_vector),
            });
        }

        sort_hits(&mut hits);
        hits.truncate(k);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| PdfChatError::Store("memory store poisoned".to_string()))?;
        Ok(guard.len())
    }

    async fn clear(&self) -> Result<()> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| PdfChatError::Store("memory store poisoned".to_string()))?;
        guard.clear();
        Ok(())
    }
}
