use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::Value;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};
use tracing::{debug, info, warn};

use loanrag_core::error::{Error, Result};
use loanrag_core::traits::LexicalBackend;
use loanrag_core::types::{Chunk, SearchHit, SourceKind};

use crate::tantivy_utils::{build_schema, fields_of, register_tokenizer, PolicyFields};
use crate::version::corpus_version;

const CURRENT: &str = "CURRENT";
const WRITER_HEAP: usize = 50_000_000;

struct LoadedIndex {
	version: String,
	dir: PathBuf,
	index: Index,
	reader: IndexReader,
	fields: PolicyFields,
}

/// BM25 search over a tantivy index stored at `<root>/<corpus_version>/`.
///
/// `<root>/CURRENT` names the active version and is replaced by rename, so a
/// reader never observes a half-written pointer.
pub struct TantivyLexicalBackend {
	root: PathBuf,
	loaded: RwLock<Option<Arc<LoadedIndex>>>,
}

impl TantivyLexicalBackend {
	/// Attach to whatever index is persisted under `root`. A missing index is
	/// not an error here; queries report it as `IndexUnavailable`.
	pub fn open(root: impl Into<PathBuf>) -> Self {
		let root = root.into();
		let loaded = match Self::load_current(&root) {
			Ok(l) => Some(Arc::new(l)),
			Err(e) => { debug!(root = %root.display(), error = %e, "no persisted lexical index"); None }
		};
		Self { root, loaded: RwLock::new(loaded) }
	}

	pub fn root(&self) -> &Path { &self.root }

	/// Corpus version of the active index, if one is loaded.
	pub fn version(&self) -> Option<String> {
		self.loaded.read().ok().and_then(|g| g.as_ref().map(|l| l.version.clone()))
	}

	fn load_current(root: &Path) -> anyhow::Result<LoadedIndex> {
		let pointer = root.join(CURRENT);
		let version = fs::read_to_string(&pointer).with_context(|| format!("read {}", pointer.display()))?;
		let version = version.trim();
		anyhow::ensure!(!version.is_empty(), "{} is empty", pointer.display());
		Self::load_version(root, version)
	}

	fn load_version(root: &Path, version: &str) -> anyhow::Result<LoadedIndex> {
		let dir = root.join(version);
		let index = Index::open_in_dir(&dir).with_context(|| format!("open index {}", dir.display()))?;
		register_tokenizer(&index);
		let fields = fields_of(&index.schema())?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		Ok(LoadedIndex { version: version.to_string(), dir, index, reader, fields })
	}

	fn write_version(&self, version: &str, chunks: &[Chunk]) -> anyhow::Result<()> {
		let dir = self.root.join(version);
		if dir.exists() { fs::remove_dir_all(&dir)?; }
		fs::create_dir_all(&dir)?;
		let (schema, fields) = build_schema();
		let index = Index::create_in_dir(&dir, schema)?;
		register_tokenizer(&index);
		// Single thread keeps segment layout identical across rebuilds.
		let mut writer: IndexWriter = index.writer_with_num_threads(1, WRITER_HEAP)?;
		for (ordinal, c) in chunks.iter().enumerate() {
			writer.add_document(doc!(
				fields.id => c.id.clone(),
				fields.ordinal => ordinal as u64,
				fields.text => c.text.clone(),
			))?;
		}
		writer.commit()?;
		Ok(())
	}

	fn swap_pointer(&self, version: &str) -> anyhow::Result<()> {
		let tmp = self.root.join(format!("{CURRENT}.tmp"));
		fs::write(&tmp, version)?;
		fs::rename(&tmp, self.root.join(CURRENT))?;
		Ok(())
	}

	fn prune_stale(&self, keep: &str) {
		let Ok(entries) = fs::read_dir(&self.root) else { return };
		for entry in entries.filter_map(|e| e.ok()) {
			let path = entry.path();
			if !path.is_dir() || entry.file_name().to_string_lossy() == keep { continue; }
			if let Err(e) = fs::remove_dir_all(&path) {
				warn!(dir = %path.display(), error = %e, "failed to remove stale lexical index");
			}
		}
	}

	fn current(&self) -> Result<Arc<LoadedIndex>> {
		{
			let guard = self.loaded.read().map_err(|_| Error::Operation("lexical index lock poisoned".into()))?;
			match guard.as_ref() {
				Some(l) if l.dir.exists() => return Ok(Arc::clone(l)),
				Some(l) => return Err(Error::IndexUnavailable(format!("index directory {} is missing", l.dir.display()))),
				None => {}
			}
		}
		// Another process may have built an index since we opened.
		let loaded = Self::load_current(&self.root)
			.map(Arc::new)
			.map_err(|e| Error::IndexUnavailable(format!("no lexical index under {}: {}", self.root.display(), e)))?;
		let mut guard = self.loaded.write().map_err(|_| Error::Operation("lexical index lock poisoned".into()))?;
		*guard = Some(Arc::clone(&loaded));
		Ok(loaded)
	}

	fn search(loaded: &LoadedIndex, text: &str, k: usize) -> anyhow::Result<Vec<SearchHit>> {
		let searcher = loaded.reader.searcher();
		let total = usize::try_from(searcher.num_docs())?;
		if total == 0 || k == 0 { return Ok(vec![]); }
		let qp = QueryParser::for_index(&loaded.index, vec![loaded.fields.text]);
		let (q, errors) = qp.parse_query_lenient(text);
		if !errors.is_empty() { debug!(query = text, issues = errors.len(), "lenient query parse dropped clauses"); }
		// Collect every match so ties at the k boundary resolve by insertion
		// order rather than by segment layout.
		let top_docs = searcher.search(&q, &TopDocs::with_limit(total))?;
		let mut scored = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr)?;
			let id = doc
				.get_first(loaded.fields.id)
				.and_then(|v| v.as_str())
				.ok_or_else(|| anyhow::anyhow!("indexed document without id"))?
				.to_string();
			let ordinal = doc.get_first(loaded.fields.ordinal).and_then(|v| v.as_u64()).unwrap_or(u64::MAX);
			scored.push((score, ordinal, id));
		}
		scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
		scored.truncate(k);
		Ok(SearchHit::ranked(SourceKind::Lexical, scored.into_iter().map(|(score, _, id)| (id, score))))
	}
}

impl LexicalBackend for TantivyLexicalBackend {
	fn build(&self, chunks: &[Chunk]) -> Result<()> {
		fs::create_dir_all(&self.root).map_err(Error::operation)?;
		let version = corpus_version(chunks);
		let unchanged = self.version().as_deref() == Some(version.as_str()) && self.root.join(&version).exists();
		if unchanged {
			debug!(version = %version, "lexical index already current");
		} else {
			self.write_version(&version, chunks).map_err(Error::operation)?;
		}
		self.swap_pointer(&version).map_err(Error::operation)?;
		let loaded = Self::load_version(&self.root, &version).map_err(Error::operation)?;
		{
			let mut guard = self.loaded.write().map_err(|_| Error::Operation("lexical index lock poisoned".into()))?;
			*guard = Some(Arc::new(loaded));
		}
		self.prune_stale(&version);
		info!(version = %version, chunks = chunks.len(), root = %self.root.display(), "lexical index built");
		Ok(())
	}

	fn query(&self, text: &str, k: usize) -> Result<Vec<SearchHit>> {
		let loaded = self.current()?;
		Self::search(&loaded, text, k).map_err(Error::operation)
	}

	fn is_available(&self) -> bool {
		self.current().is_ok()
	}
}
