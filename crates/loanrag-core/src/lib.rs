//! loanrag-core
//!
//! Shared domain types, the error taxonomy, backend traits and configuration
//! used by every other crate in the workspace.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod error;
pub mod ingest;
pub mod store;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use store::ChunkStore;
pub use types::{
    BankConfidence, Chunk, ChunkId, Citation, ContributingRanks, Degradation, FusedResult,
    Retrieval, RetrievalMode, SearchHit, SourceKind,
};
