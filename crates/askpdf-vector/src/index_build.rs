//! IVF-PQ index build over the `vector` column.
//!
//! Until an index is built, searches are an exact flat scan. Building one
//! trades a little recall for speed on large tables.
use chrono::Utc;
use lancedb::index::vector::IvfPqIndexBuilder;
use lancedb::index::Index;
use tracing::info;

use askpdf_core::{Error, Result};

use crate::schema::VECTOR_COLUMN;
use crate::search::distance_type;
use crate::table::open_existing;
use crate::VectorIndex;

/// Product quantisation with 8-bit codes needs at least this many rows to train.
pub const MIN_TRAINING_ROWS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IvfPqParams {
    pub nlist: usize,
    pub m: usize,
}

pub fn compute_ivfpq_params(total_rows: usize, dim: usize) -> IvfPqParams {
    let sqrt_n = (total_rows as f64).sqrt() as usize;
    let nlist = sqrt_n.clamp(1, 65536);
    // sub-vectors must divide the dimension
    let mut m = if dim >= 1024 { 32 } else { 16 }.min(dim.max(1));
    while m > 1 && dim % m != 0 {
        m -= 1;
    }
    IvfPqParams { nlist, m: m.max(1) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexBuildReport {
    pub name: String,
    pub rows: usize,
    pub partitions: usize,
    pub sub_vectors: usize,
}

impl VectorIndex {
    pub async fn build_ann_index(&self) -> Result<IndexBuildReport> {
        let table = open_existing(&self.conn, &self.table_name)
            .await?
            .ok_or_else(|| Error::IndexNotFound(self.table_name.clone()))?;
        let rows = table.count_rows(None).await.map_err(Error::storage)?;
        if rows < MIN_TRAINING_ROWS {
            return Err(Error::InvalidInput(format!(
                "ANN index needs at least {MIN_TRAINING_ROWS} rows, table has {rows}"
            )));
        }
        let params = compute_ivfpq_params(rows, self.dim);
        let name = format!("{VECTOR_COLUMN}_ivfpq_{}", Utc::now().format("%Y%m%d%H%M%S"));
        table
            .create_index(
                &[VECTOR_COLUMN],
                Index::IvfPq(
                    IvfPqIndexBuilder::default()
                        .distance_type(distance_type(self.metric))
                        .num_partitions(params.nlist as u32)
                        .num_sub_vectors(params.m as u32),
                ),
            )
            .name(name.clone())
            .execute()
            .await
            .map_err(Error::storage)?;
        info!(index = %name, rows, nlist = params.nlist, m = params.m, "built IVF-PQ index");
        Ok(IndexBuildReport { name, rows, partitions: params.nlist, sub_vectors: params.m })
    }
}
