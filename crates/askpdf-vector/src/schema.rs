use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub const SOURCE_ID_COLUMN: &str = "source_id";
pub const TEXT_COLUMN: &str = "text";
pub const VECTOR_COLUMN: &str = "vector";
/// Added by LanceDB to vector search results.
pub const DISTANCE_COLUMN: &str = "_distance";

pub fn build_arrow_schema(dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(SOURCE_ID_COLUMN, DataType::Utf8, false),
        Field::new(TEXT_COLUMN, DataType::Utf8, false),
        Field::new(
            VECTOR_COLUMN,
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim as i32),
            true,
        ),
    ]))
}

/// Width of the `vector` column, if the schema has one.
pub fn vector_width(schema: &Schema) -> Option<usize> {
    match schema.field_with_name(VECTOR_COLUMN).ok()?.data_type() {
        DataType::FixedSizeList(_, width) => usize::try_from(*width).ok(),
        _ => None,
    }
}

/// SQL predicate selecting one document's rows.
pub fn source_filter(source_id: &str) -> String {
    format!("{SOURCE_ID_COLUMN} = '{}'", source_id.replace('\'', "''"))
}
