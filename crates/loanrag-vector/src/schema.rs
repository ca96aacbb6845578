use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub const ID_COLUMN: &str = "id";
pub const VECTOR_COLUMN: &str = "vector";
pub const DISTANCE_COLUMN: &str = "_distance";

/// Row layout of a namespace table: external vector id, the chunk it
/// embeds, bank and page for inspection, and the fixed-width embedding.
pub fn build_arrow_schema(dim: usize) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new(ID_COLUMN, DataType::Utf8, false),
		Field::new("chunk_id", DataType::Utf8, false),
		Field::new("bank", DataType::Utf8, false),
		Field::new("page", DataType::Int32, false),
		Field::new(
			VECTOR_COLUMN,
			DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim as i32),
			true,
		),
	]))
}
