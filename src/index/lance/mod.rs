#[cfg(test)]
mod tests;

use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::{
    Connection, Table,
    query::{ExecutableQuery, QueryBase},
};
use tracing::{debug, info};

use crate::index::{IndexEntry, SearchHit, VectorStore, dot, sort_hits};
use crate::{PdfChatError, Result};

const TABLE_NAME: &str = "corpus";

/// Durable vector store backed by a LanceDB table.
///
/// The table is created lazily on the first insert, when the embedding
/// dimension is known. Hits returned by the ANN search are re-scored
/// in-process against the stored vectors, so the final ordering does not
/// depend on the backend's distance metric.
#[derive(Clone)]
pub struct LanceStore {
    connection: Connection,
}

impl LanceStore {
    #[inline]
    pub async fn open(db_dir: &Path) -> Result<Self> {
        debug!("Opening LanceDB at {}", db_dir.display());

        std::fs::create_dir_all(db_dir).map_err(|e| {
            PdfChatError::Store(format!("Failed to create vector database directory: {e}"))
        })?;

        let uri = format!("file://{}", db_dir.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| PdfChatError::Store(format!("Failed to connect to LanceDB: {e}")))?;

        Ok(Self { connection })
    }

    async fn table_exists(&self) -> Result<bool> {
        let names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| PdfChatError::Store(format!("Failed to list tables: {e}")))?;
        Ok(names.contains(&TABLE_NAME.to_string()))
    }

    async fn open_table(&self) -> Result<Table> {
        self.connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| PdfChatError::Store(format!("Failed to open table: {e}")))
    }

    fn schema(dimension: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("chunk_id", DataType::UInt32, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    dimension as i32,
                ),
                false,
            ),
            Field::new("text", DataType::Utf8, false),
            Field::new("source_file", DataType::Utf8, false),
            Field::new("page_label", DataType::Utf8, false),
        ]))
    }

    fn record_batch(entries: &[IndexEntry], dimension: usize) -> Result<RecordBatch> {
        let len = entries.len();

        let mut chunk_ids = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * dimension);
        let mut texts = Vec::with_capacity(len);
        let mut source_files = Vec::with_capacity(len);
        let mut page_labels = Vec::with_capacity(len);

        for entry in entries {
            if entry.vector.len() != dimension {
                return Err(PdfChatError::Store(format!(
                    "entry {} has dimension {}, expected {}",
                    entry.chunk_id,
                    entry.vector.len(),
                    dimension
                )));
            }
            chunk_ids.push(entry.chunk_id);
            flat_values.extend_from_slice(&entry.vector);
            texts.push(entry.text.as_str());
            source_files.push(entry.source_file.as_str());
            page_labels.push(entry.page_label.as_str());
        }

        let values_array = Float32Array::from(flat_values);
        let item_field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(item_field, dimension as i32, Arc::new(values_array), None)
                .map_err(|e| PdfChatError::Store(format!("Failed to create vector array: {e}")))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(UInt32Array::from(chunk_ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(texts)),
            Arc::new(StringArray::from(source_files)),
            Arc::new(StringArray::from(page_labels)),
        ];

        RecordBatch::try_new(Self::schema(dimension), arrays)
            .map_err(|e| PdfChatError::Store(format!("Failed to create record batch: {e}")))
    }

    fn parse_batch(batch: &RecordBatch, query_vector: &[f32]) -> Result<Vec<SearchHit>> {
        let chunk_ids = batch
            .column_by_name("chunk_id")
            .and_then(|col| col.as_any().downcast_ref::<UInt32Array>())
            .ok_or_else(|| PdfChatError::Store("Missing or invalid chunk_id column".to_string()))?;

        let vectors = batch
            .column_by_name("vector")
            .and_then(|col| col.as_any().downcast_ref::<FixedSizeListArray>())
            .ok_or_else(|| PdfChatError::Store("Missing or invalid vector column".to_string()))?;

        let texts = batch
            .column_by_name("text")
            .and_then(|col| col.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| PdfChatError::Store("Missing or invalid text column".to_string()))?;

        let source_files = batch
            .column_by_name("source_file")
            .and_then(|col| col.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| {
                PdfChatError::Store("Missing or invalid source_file column".to_string())
            })?;

        let page_labels = batch
            .column_by_name("page_label")
            .and_then(|col| col.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| {
                PdfChatError::Store("Missing or invalid page_label column".to_string())
            })?;

        let mut hits = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let values = vectors.value(row);
            let values = values
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| PdfChatError::Store("Invalid vector item type".to_string()))?;
            let stored: Vec<f32> = values.iter().map(|v| v.unwrap_or(0.0)).collect();

            hits.push(SearchHit {
                chunk_id: chunk_ids.value(row),
                text: texts.value(row).to_string(),
                source_file: source_files.value(row).to_string(),
                page_label: page_labels.value(row).to_string(),
                // Vectors are unit length, so the dot product is the cosine
                // similarity.
                score: dot(&stored, query_vector),
            });
        }

        Ok(hits)
    }
}

#[async_trait]
impl VectorStore for LanceStore {
    async fn add_entries(&self, entries: &[IndexEntry]) -> Result<()> {
        if entries.is_empty() {
            debug!("No entries to store");
            return Ok(());
        }

        let dimension = entries[0].vector.len();

        if !self.table_exists().await? {
            debug!("Creating table '{TABLE_NAME}' with dimension {dimension}");
            self.connection
                .create_empty_table(TABLE_NAME, Self::schema(dimension))
                .execute()
                .await
                .map_err(|e| PdfChatError::Store(format!("Failed to create table: {e}")))?;
        }

        let batch = Self::record_batch(entries, dimension)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);

        let table = self.open_table().await?;
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| PdfChatError::Store(format!("Failed to insert entries: {e}")))?;

        info!("Stored {} entries in table '{TABLE_NAME}'", entries.len());
        Ok(())
    }

    async fn nearest(&self, query_vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if !self.table_exists().await? {
            return Ok(Vec::new());
        }

        let table = self.open_table().await?;
        let mut stream = table
            .vector_search(query_vector)
            .map_err(|e| PdfChatError::Store(format!("Failed to create vector search: {e}")))?
            .column("vector")
            .limit(k)
            .execute()
            .await
            .map_err(|e| PdfChatError::Store(format!("Failed to execute search: {e}")))?;

        let mut hits = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| PdfChatError::Store(format!("Failed to read result stream: {e}")))?
        {
            hits.extend(Self::parse_batch(&batch, query_vector)?);
        }

        sort_hits(&mut hits);
        hits.truncate(k);

        debug!("Vector search returned {} hits", hits.len());
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        if !self.table_exists().await? {
            return Ok(0);
        }

        let table = self.open_table().await?;
        table
            .count_rows(None)
            .await
            .map_err(|e| PdfChatError::Store(format!("Failed to count rows: {e}")))
    }

    async fn clear(&self) -> Result<()> {
        if self.table_exists().await? {
            info!("Dropping table '{TABLE_NAME}'");
            self.connection
                .drop_table(TABLE_NAME)
                .await
                .map_err(|e| PdfChatError::Store(format!("Failed to drop table: {e}")))?;
        }
        Ok(())
    }
}
