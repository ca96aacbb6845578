//! LanceDB on local disk. One table per namespace and embedding width, so a
//! model change never collides with rows of a different dimension.
use anyhow::{anyhow, Result};
use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::{VectorMatch, VectorRecord, VectorStore};
use crate::schema::{build_arrow_schema, DISTANCE_COLUMN, ID_COLUMN};

pub struct LanceVectorStore {
	db: Connection,
	path: PathBuf,
	batch_size: usize,
}

impl LanceVectorStore {
	pub async fn connect(path: &Path, batch_size: usize) -> Result<Self> {
		std::fs::create_dir_all(path)?;
		let db = connect(path.to_string_lossy().as_ref()).execute().await?;
		Ok(Self { db, path: path.to_path_buf(), batch_size: batch_size.max(1) })
	}

	fn table_prefix(namespace: &str) -> String {
		let safe: String = namespace
			.chars()
			.map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
			.collect();
		format!("chunks_{safe}_d")
	}

	fn table_name(namespace: &str, dim: usize) -> String {
		format!("{}{dim}", Self::table_prefix(namespace))
	}

	fn is_namespace_table(namespace: &str, name: &str) -> bool {
		name.strip_prefix(&Self::table_prefix(namespace))
			.is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
	}

	async fn table_exists(&self, name: &str) -> Result<bool> {
		Ok(self.db.table_names().execute().await?.iter().any(|n| n == name))
	}

	fn to_record_batch(records: &[VectorRecord], dim: usize) -> Result<RecordBatch> {
		let schema = build_arrow_schema(dim);
		let mut ids = Vec::with_capacity(records.len());
		let mut chunk_ids = Vec::with_capacity(records.len());
		let mut banks = Vec::with_capacity(records.len());
		let mut pages = Vec::with_capacity(records.len());
		let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(records.len());
		for r in records {
			if r.values.len() != dim {
				return Err(anyhow!("vector {} has width {}, expected {}", r.id, r.values.len(), dim));
			}
			ids.push(r.id.clone());
			chunk_ids.push(r.chunk_id.clone());
			banks.push(r.bank.clone());
			pages.push(i32::try_from(r.page).unwrap_or(i32::MAX));
			vectors.push(Some(r.values.iter().map(|&x| Some(x)).collect()));
		}
		let record_batch = RecordBatch::try_new(schema, vec![
			Arc::new(StringArray::from(ids)),
			Arc::new(StringArray::from(chunk_ids)),
			Arc::new(StringArray::from(banks)),
			Arc::new(Int32Array::from(pages)),
			Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors.into_iter(), dim as i32)),
		])?;
		Ok(record_batch)
	}

	async fn insert_batch(&self, name: &str, records: &[VectorRecord], dim: usize) -> Result<()> {
		let record_batch = Self::to_record_batch(records, dim)?;
		let schema = record_batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
		if self.table_exists(name).await? {
			self.db.open_table(name).execute().await?.add(reader).execute().await?;
		} else {
			self.db.create_table(name, reader).execute().await?;
		}
		Ok(())
	}
}

#[async_trait]
impl VectorStore for LanceVectorStore {
	fn describe(&self) -> String { format!("lancedb:{}", self.path.display()) }

	async fn replace_namespace(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<()> {
		let names = self.db.table_names().execute().await?;
		for name in names.iter().filter(|n| Self::is_namespace_table(namespace, n)) {
			let table = self.db.open_table(name).execute().await?;
			table.delete("true").await?;
			debug!(table = %name, "cleared namespace table");
		}
		let Some(dim) = records.first().map(|r| r.values.len()) else { return Ok(()) };
		let name = Self::table_name(namespace, dim);
		for batch in records.chunks(self.batch_size) {
			self.insert_batch(&name, batch, dim).await?;
		}
		info!(table = %name, rows = records.len(), "namespace replaced");
		Ok(())
	}

	async fn vector_search(&self, vector: &[f32], k: usize, namespace: &str) -> Result<Vec<VectorMatch>> {
		let name = Self::table_name(namespace, vector.len());
		if k == 0 || !self.table_exists(&name).await? { return Ok(vec![]); }
		let table = self.db.open_table(&name).execute().await?;
		let mut stream = table
			.vector_search(vector.to_vec())?
			.distance_type(DistanceType::Cosine)
			.limit(k)
			.execute()
			.await?;
		let mut matches = Vec::new();
		while let Some(batch) = stream.try_next().await? {
			let ids = batch
				.column_by_name(ID_COLUMN)
				.and_then(|c| c.as_any().downcast_ref::<StringArray>())
				.ok_or_else(|| anyhow!("result batch lacks an '{}' column", ID_COLUMN))?;
			let distances = batch
				.column_by_name(DISTANCE_COLUMN)
				.and_then(|c| c.as_any().downcast_ref::<Float32Array>())
				.ok_or_else(|| anyhow!("result batch lacks a '{}' column", DISTANCE_COLUMN))?;
			for i in 0..batch.num_rows() {
				matches.push(VectorMatch { id: ids.value(i).to_string(), score: 1.0 - distances.value(i) });
			}
		}
		matches.sort_by(|a, b| b.score.total_cmp(&a.score));
		matches.truncate(k);
		Ok(matches)
	}
}
