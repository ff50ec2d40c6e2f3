use arrow_array::{Array, Float32Array, RecordBatch, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::DistanceType;
use tracing::{debug, warn};

use askpdf_core::config::DistanceMetric;
use askpdf_core::types::SearchResult;
use askpdf_core::{Error, Result};

use crate::schema::{source_filter, DISTANCE_COLUMN, TEXT_COLUMN};
use crate::table::open_existing;
use crate::VectorIndex;

pub(crate) fn distance_type(metric: DistanceMetric) -> DistanceType {
    match metric {
        DistanceMetric::Cosine => DistanceType::Cosine,
        DistanceMetric::L2 => DistanceType::L2,
    }
}

/// `1 - d`, clamped into [0, 1]. Returns whether clamping was needed.
/// A NaN distance scores 0 and counts as clamped.
pub(crate) fn score_from_distance(distance: f32) -> (f32, bool) {
    if distance.is_nan() {
        return (0.0, true);
    }
    let raw = 1.0 - distance;
    let clamped = raw.clamp(0.0, 1.0);
    (clamped, (clamped - raw).abs() > 1e-4)
}

impl VectorIndex {
    /// Nearest chunks to `query`, best first. The source filter is applied
    /// before the top-k cut.
    pub async fn search(&self, query: &[f32], source_id: Option<&str>, top_k: usize) -> Result<Vec<SearchResult>> {
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: query.len() });
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let table = open_existing(&self.conn, &self.table_name)
            .await?
            .ok_or_else(|| Error::IndexNotFound(self.table_name.clone()))?;

        let mut q = table
            .vector_search(query.to_vec())
            .map_err(Error::storage)?
            .distance_type(distance_type(self.metric))
            .limit(top_k);
        if let Some(id) = source_id {
            q = q.only_if(source_filter(id));
        }
        let mut stream = q.execute().await.map_err(Error::storage)?;

        let mut results = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(Error::storage)? {
            self.collect_results(&batch, &mut results)?;
        }
        results.truncate(top_k);
        debug!(table = %self.table_name, source_id, hits = results.len(), "vector search");
        Ok(results)
    }

    fn collect_results(&self, batch: &RecordBatch, out: &mut Vec<SearchResult>) -> Result<()> {
        let texts = column::<StringArray>(batch, TEXT_COLUMN)?;
        let distances = column::<Float32Array>(batch, DISTANCE_COLUMN)?;
        for i in 0..batch.num_rows() {
            let distance = distances.value(i);
            let (score, clamped) = score_from_distance(distance);
            if clamped {
                warn!(distance, metric = ?self.metric, "similarity outside [0,1]; check the index metric");
            }
            out.push(SearchResult { text: texts.value(i).to_string(), score });
        }
        Ok(())
    }

    /// Rows stored for `source_id`, or in total.
    pub async fn count(&self, source_id: Option<&str>) -> Result<usize> {
        let table = open_existing(&self.conn, &self.table_name)
            .await?
            .ok_or_else(|| Error::IndexNotFound(self.table_name.clone()))?;
        table.count_rows(source_id.map(source_filter)).await.map_err(Error::storage)
    }

    /// Delete every chunk of `source_id`; returns the number of rows removed.
    pub async fn remove_source(&self, source_id: &str) -> Result<usize> {
        if source_id.trim().is_empty() {
            return Err(Error::InvalidInput("source_id must not be blank".to_string()));
        }
        let Some(table) = open_existing(&self.conn, &self.table_name).await? else {
            return Ok(0);
        };
        let filter = source_filter(source_id);
        let removed = table.count_rows(Some(filter.clone())).await.map_err(Error::storage)?;
        if removed > 0 {
            table.delete(&filter).await.map_err(Error::storage)?;
        }
        debug!(source_id, removed, "removed source");
        Ok(removed)
    }
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| Error::Storage(format!("search result column '{name}' missing or mistyped").into()))
}
