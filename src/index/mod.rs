#[cfg(test)]
mod tests;

pub mod lance;
pub mod manifest;
pub mod memory;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::chunking::Chunk;
use crate::providers::EmbeddingModel;
use crate::{PdfChatError, Result};

pub use lance::LanceStore;
pub use manifest::{CollectionManifest, ManifestDb};
pub use memory::MemoryStore;

/// Name of the single collection one corpus build produces
pub const COLLECTION_NAME: &str = "corpus";

/// One indexed chunk: its id, normalized embedding, text and provenance
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk_id: u32,
    pub vector: Vec<f32>,
    pub text: String,
    pub source_file: String,
    pub page_label: String,
}

/// A scored retrieval hit, ordered by descending cosine similarity
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk_id: u32,
    pub text: String,
    pub source_file: String,
    pub page_label: String,
    pub score: f32,
}

/// Storage backend for one collection of index entries.
///
/// Implementations must return `nearest` hits ordered by descending score
/// with ties broken by ascending `chunk_id` (insertion order).
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn add_entries(&self, entries: &[IndexEntry]) -> Result<()>;

    async fn nearest(&self, query_vector: &[f32], k: usize) -> Result<Vec<SearchHit>>;

    async fn count(&self) -> Result<usize>;

    async fn clear(&self) -> Result<()>;
}

/// Options controlling the build/load decision
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexOptions {
    /// Skip the load path and rebuild even when a compatible persisted
    /// collection exists
    pub force_rebuild: bool,
}

/// The embedding index: a populated vector store plus the embedder that
/// produced (and queries) its vectors. The two are bound together so a query
/// can never be embedded with a different model than the stored entries.
pub struct EmbeddingIndex {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingModel>,
    entry_count: usize,
    loaded_from_disk: bool,
}

struct DurableBackend {
    store: LanceStore,
    manifest: ManifestDb,
}

impl DurableBackend {
    async fn open(persist_dir: &Path) -> anyhow::Result<Self> {
        let store = LanceStore::open(&persist_dir.join("vectors")).await?;
        let manifest = ManifestDb::open(&persist_dir.join("collections.db")).await?;
        Ok(Self { store, manifest })
    }
}

impl EmbeddingIndex {
    /// Open the index at `persist_dir`, loading the persisted collection when
    /// it is complete and was built with the same embedding model, rebuilding
    /// from `chunks` otherwise. `persist_dir: None` always builds in memory.
    ///
    /// Persistence failures are never fatal: when the durable backend cannot
    /// be opened or written, the index falls back to an in-memory store and
    /// logs a warning.
    #[inline]
    pub async fn open(
        persist_dir: Option<&Path>,
        chunks: &[Chunk],
        embedder: Arc<dyn EmbeddingModel>,
        options: IndexOptions,
    ) -> Result<Self> {
        let Some(dir) = persist_dir else {
            return Self::build_in_memory(chunks, embedder).await;
        };

        match DurableBackend::open(dir).await {
            Ok(backend) => Self::open_durable(backend, chunks, embedder, options).await,
            Err(e) => {
                warn!(
                    "Durable storage unavailable at {} ({e:#}); using in-memory index",
                    dir.display()
                );
                Self::build_in_memory(chunks, embedder).await
            }
        }
    }

    /// Build a fresh in-memory collection, used when no persistence location
    /// is configured and as the fallback when durable storage fails.
    #[inline]
    pub async fn build_in_memory(
        chunks: &[Chunk],
        embedder: Arc<dyn EmbeddingModel>,
    ) -> Result<Self> {
        let entries = embed_chunks(chunks, embedder.as_ref())?;

        let store = MemoryStore::new();
        store.add_entries(&entries).await?;

        info!("Built in-memory index with {} entries", entries.len());
        Ok(Self {
            store: Arc::new(store),
            embedder,
            entry_count: entries.len(),
            loaded_from_disk: false,
        })
    }

    async fn open_durable(
        backend: DurableBackend,
        chunks: &[Chunk],
        embedder: Arc<dyn EmbeddingModel>,
        options: IndexOptions,
    ) -> Result<Self> {
        if !options.force_rebuild {
            if let Some(index) = Self::try_load(&backend, &embedder).await {
                return Ok(index);
            }
        }

        Self::rebuild(backend, chunks, embedder).await
    }

    /// The load path: only a complete persisted collection (manifest row
    /// present, non-zero entries) built with the same embedding model is
    /// reused. Anything else means rebuild.
    async fn try_load(backend: &DurableBackend, embedder: &Arc<dyn EmbeddingModel>) -> Option<Self> {
        let manifest = match backend.manifest.get(COLLECTION_NAME).await {
            Ok(found) => found?,
            Err(e) => {
                warn!("Failed to read collection manifest ({e:#}); rebuilding");
                return None;
            }
        };

        if manifest.entry_count == 0 {
            debug!("Persisted collection is empty; rebuilding");
            return None;
        }

        if manifest.embed_model_id != embedder.model_id() {
            // Vectors from different embedding models live in different
            // spaces; loading them would silently corrupt similarity search.
            warn!(
                "{}; rebuilding",
                PdfChatError::IncompatibleIndex {
                    stored: manifest.embed_model_id.clone(),
                    requested: embedder.model_id().to_string(),
                }
            );
            return None;
        }

        let count = match backend.store.count().await {
            Ok(count) => count,
            Err(e) => {
                warn!("Failed to count persisted entries ({e}); rebuilding");
                return None;
            }
        };
        if count == 0 {
            warn!("Manifest present but vector table is empty; rebuilding");
            return None;
        }

        info!(
            "Loaded persisted collection '{}': {} entries, model {}, built {}",
            manifest.name, count, manifest.embed_model_id, manifest.built_at
        );
        Some(Self {
            store: Arc::new(backend.store.clone()),
            embedder: Arc::clone(embedder),
            entry_count: count,
            loaded_from_disk: true,
        })
    }

    async fn rebuild(
        backend: DurableBackend,
        chunks: &[Chunk],
        embedder: Arc<dyn EmbeddingModel>,
    ) -> Result<Self> {
        let entries = embed_chunks(chunks, embedder.as_ref())?;
        let dimension = entries[0].vector.len();

        // Retract the manifest row first so a crash mid-rebuild leaves no
        // manifest pointing at a partial vector table.
        if let Err(e) = backend.manifest.delete(COLLECTION_NAME).await {
            warn!("Failed to retract stale manifest row ({e:#}); continuing");
        }

        // Best-effort discard of the stale collection; a blocked deletion
        // must not abort initialization.
        let (store, durable): (Arc<dyn VectorStore>, bool) = match backend.store.clear().await {
            Ok(()) => (Arc::new(backend.store), true),
            Err(e) => {
                warn!("Failed to discard stale collection ({e}); using in-memory store");
                (Arc::new(MemoryStore::new()), false)
            }
        };

        let (store, durable) = match store.add_entries(&entries).await {
            Ok(()) => (store, durable),
            Err(e) => {
                warn!("Failed to persist entries ({e}); using in-memory store");
                let fallback = MemoryStore::new();
                fallback.add_entries(&entries).await?;
                (Arc::new(fallback) as Arc<dyn VectorStore>, false)
            }
        };

        // The manifest row is the visibility gate: written only after every
        // entry landed in the durable store. When the build fell back to
        // memory there is nothing on disk worth advertising.
        if durable {
            let row =
                CollectionManifest::new(COLLECTION_NAME, embedder.model_id(), dimension, entries.len());
            if let Err(e) = backend.manifest.upsert(&row).await {
                warn!("Failed to record collection manifest ({e:#})");
            }
        }

        info!(
            "Built collection '{}': {} entries, dimension {}",
            COLLECTION_NAME,
            entries.len(),
            dimension
        );
        Ok(Self {
            store,
            embedder,
            entry_count: entries.len(),
            loaded_from_disk: false,
        })
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingModel>,
        entry_count: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            entry_count,
            loaded_from_disk: false,
        }
    }

    /// Embed `query` with the index's own model and return the `k` nearest
    /// entries.
    #[inline]
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let mut vector = self
            .embedder
            .embed(query)
            .map_err(|e| PdfChatError::Embedding(format!("{e:#}")))?;
        l2_normalize(&mut vector);
        self.store.nearest(&vector, k).await
    }

    #[inline]
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Whether this index was loaded from a persisted collection rather than
    /// rebuilt
    #[inline]
    pub fn loaded_from_disk(&self) -> bool {
        self.loaded_from_disk
    }

    #[inline]
    pub fn embed_model_id(&self) -> &str {
        self.embedder.model_id()
    }
}

/// Embed every chunk (batched by the provider) into normalized index entries
fn embed_chunks(chunks: &[Chunk], embedder: &dyn EmbeddingModel) -> Result<Vec<IndexEntry>> {
    if chunks.is_empty() {
        return Err(PdfChatError::EmptyCorpus);
    }

    debug!("Embedding {} chunks", chunks.len());

    let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
    let vectors = embedder
        .embed_batch(&texts)
        .map_err(|e| PdfChatError::Embedding(format!("{e:#}")))?;

    if vectors.len() != chunks.len() {
        return Err(PdfChatError::Embedding(format!(
            "embedder returned {} vectors for {} chunks",
            vectors.len(),
            chunks.len()
        )));
    }

    let dimension = vectors[0].len();
    let mut entries = Vec::with_capacity(chunks.len());
    for (chunk, mut vector) in chunks.iter().zip(vectors) {
        if vector.len() != dimension {
            return Err(PdfChatError::Embedding(format!(
                "inconsistent embedding dimensions: {} vs {}",
                vector.len(),
                dimension
            )));
        }
        l2_normalize(&mut vector);
        entries.push(IndexEntry {
            chunk_id: chunk.chunk_id,
            vector,
            text: chunk.text.clone(),
            source_file: chunk.source_file.clone(),
            page_label: chunk.page_label.clone(),
        });
    }

    Ok(entries)
}

/// Normalize to unit length so dot products equal cosine similarity.
/// Zero vectors are left unchanged.
pub(crate) fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Dot product of two equal-length vectors
pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Descending score, ascending `chunk_id` on ties. `chunk_id` is assigned in
/// insertion order, so this is the deterministic tie-break.
pub(crate) fn sort_hits(hits: &mut [SearchHit]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
}
