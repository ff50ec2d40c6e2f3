//! LanceDB-backed chunk store.
//!
//! One table holds `(source_id, text, vector)` rows for every ingested
//! document. Searches are nearest-neighbour over `vector`, prefiltered by
//! `source_id`; the vector width is fixed per table.
pub mod index_build;
pub mod schema;
mod search;
pub mod table;
mod writer;

use async_trait::async_trait;
use lancedb::Connection;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::info;

use askpdf_core::config::{DistanceMetric, Settings};
use askpdf_core::traits::VectorStore;
use askpdf_core::types::{EmbeddedChunk, SearchResult};
use askpdf_core::{Error, Result};

pub use index_build::{IndexBuildReport, MIN_TRAINING_ROWS};

#[derive(Debug, Clone, PartialEq)]
pub struct IndexOptions {
    pub table: String,
    pub dim: usize,
    pub metric: DistanceMetric,
}

impl IndexOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            table: settings.index.table.clone(),
            dim: settings.embedding.dim,
            metric: settings.index.metric,
        }
    }
}

pub struct VectorIndex {
    pub(crate) conn: Connection,
    pub(crate) table_name: String,
    pub(crate) dim: usize,
    pub(crate) metric: DistanceMetric,
    /// Serialises first-time table creation within this process.
    pub(crate) create_lock: Mutex<()>,
}

impl VectorIndex {
    /// Connect to the database directory at `path`. An existing table must
    /// have been created with the same vector width.
    pub async fn open(path: impl AsRef<Path>, options: IndexOptions) -> Result<Self> {
        if options.dim == 0 {
            return Err(Error::InvalidConfig("vector dimension must be > 0".to_string()));
        }
        if options.table.trim().is_empty() {
            return Err(Error::InvalidConfig("index table name must not be empty".to_string()));
        }
        let uri = path.as_ref().to_string_lossy().to_string();
        let conn = table::open_db(&uri).await?;
        if let Some(existing) = table::open_existing(&conn, &options.table).await? {
            table::check_vector_width(&existing, options.dim).await?;
        }
        info!(uri = %uri, table = %options.table, dim = options.dim, metric = ?options.metric, "opened vector index");
        Ok(Self {
            conn,
            table_name: options.table,
            dim: options.dim,
            metric: options.metric,
            create_lock: Mutex::new(()),
        })
    }

    /// Release the connection.
    pub fn close(self) {
        info!(table = %self.table_name, "closed vector index");
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Whether any append has created the table yet.
    pub async fn is_initialized(&self) -> Result<bool> {
        table::table_exists(&self.conn, &self.table_name).await
    }
}

#[async_trait]
impl VectorStore for VectorIndex {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn append(&self, source_id: &str, chunks: &[EmbeddedChunk]) -> Result<usize> {
        VectorIndex::append(self, source_id, chunks).await
    }

    async fn search(&self, query: &[f32], source_id: Option<&str>, top_k: usize) -> Result<Vec<SearchResult>> {
        VectorIndex::search(self, query, source_id, top_k).await
    }

    async fn remove_source(&self, source_id: &str) -> Result<usize> {
        VectorIndex::remove_source(self, source_id).await
    }
}
