//! LanceDB connection and table helpers.
use lancedb::{connect, Connection, Table};

use askpdf_core::{Error, Result};

use crate::schema::vector_width;

pub async fn open_db(uri: &str) -> Result<Connection> {
    connect(uri).execute().await.map_err(Error::storage)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let names = conn.table_names().execute().await.map_err(Error::storage)?;
    Ok(names.iter().any(|n| n == name))
}

/// Open `name`, or `None` if it has never been created.
pub async fn open_existing(conn: &Connection, name: &str) -> Result<Option<Table>> {
    match conn.open_table(name).execute().await {
        Ok(table) => Ok(Some(table)),
        Err(lancedb::Error::TableNotFound { .. }) => Ok(None),
        Err(e) => Err(Error::storage(e)),
    }
}

/// Fail unless the stored `vector` column is exactly `dim` wide.
pub async fn check_vector_width(table: &Table, dim: usize) -> Result<()> {
    let schema = table.schema().await.map_err(Error::storage)?;
    match vector_width(&schema) {
        Some(actual) if actual == dim => Ok(()),
        Some(actual) => Err(Error::DimensionMismatch { expected: dim, actual }),
        None => Err(Error::Storage(
            format!("table '{}' has no fixed-size vector column", table.name()).into(),
        )),
    }
}
