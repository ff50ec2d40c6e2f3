use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, RecordBatch, RecordBatchIterator, RecordBatchReader, StringArray};
use std::sync::Arc;
use tracing::{debug, info};

use askpdf_core::types::EmbeddedChunk;
use askpdf_core::{Error, Result};

use crate::schema::build_arrow_schema;
use crate::table::{open_existing, table_exists};
use crate::VectorIndex;

impl VectorIndex {
    /// Write all `chunks` under `source_id` as one record batch in one commit.
    /// Creates the table on first use.
    pub async fn append(&self, source_id: &str, chunks: &[EmbeddedChunk]) -> Result<usize> {
        if source_id.trim().is_empty() {
            return Err(Error::InvalidInput("source_id must not be blank".to_string()));
        }
        if chunks.is_empty() {
            return Ok(0);
        }
        if let Some(bad) = chunks.iter().find(|c| c.vector.len() != self.dim) {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: bad.vector.len() });
        }

        let batch = self.chunks_to_record_batch(source_id, chunks)?;
        let rows = batch.num_rows();

        if let Some(table) = open_existing(&self.conn, &self.table_name).await? {
            table.add(Self::reader(batch)).execute().await.map_err(Error::storage)?;
        } else {
            let _guard = self.create_lock.lock().await;
            if table_exists(&self.conn, &self.table_name).await? {
                self.add_to_existing(batch).await?;
            } else {
                match self.conn.create_table(&self.table_name, Self::reader(batch.clone())).execute().await {
                    Ok(_) => info!(table = %self.table_name, dim = self.dim, "created vector table"),
                    // another process won the race
                    Err(lancedb::Error::TableAlreadyExists { .. }) => self.add_to_existing(batch).await?,
                    Err(e) => return Err(Error::storage(e)),
                }
            }
        }
        debug!(source_id, rows, table = %self.table_name, "appended chunks");
        Ok(rows)
    }

    async fn add_to_existing(&self, batch: RecordBatch) -> Result<()> {
        let table = self.conn.open_table(&self.table_name).execute().await.map_err(Error::storage)?;
        table.add(Self::reader(batch)).execute().await.map_err(Error::storage)?;
        Ok(())
    }

    fn reader(batch: RecordBatch) -> Box<dyn RecordBatchReader + Send> {
        let schema = batch.schema();
        Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema))
    }

    fn chunks_to_record_batch(&self, source_id: &str, chunks: &[EmbeddedChunk]) -> Result<RecordBatch> {
        let schema = build_arrow_schema(self.dim);
        let source_ids = vec![source_id; chunks.len()];
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors: Vec<Option<Vec<Option<f32>>>> = chunks
            .iter()
            .map(|c| Some(c.vector.iter().copied().map(Some).collect()))
            .collect();
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(source_ids)),
                Arc::new(StringArray::from(texts)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, self.dim as i32)),
            ],
        )
        .map_err(Error::storage)
    }
}
