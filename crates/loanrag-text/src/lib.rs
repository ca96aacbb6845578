//! loanrag-text
//!
//! Tantivy-backed lexical search over the chunk corpus. The index is persisted
//! per corpus version (see `version`) and exposed through
//! `loanrag_core::traits::LexicalBackend`.

pub mod index;
pub mod tantivy_utils;
pub mod version;

pub use index::TantivyLexicalBackend;
pub use version::corpus_version;
