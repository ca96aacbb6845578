use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use loanrag_core::types::RetrievalMode;

#[derive(Parser, Debug)]
#[command(name = "loanrag", version, about = "Hybrid retrieval and grounded answers over home-loan policy documents")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chunk documents and rebuild the lexical and semantic indexes.
    Ingest(IngestArgs),
    /// Show fused evidence, citations and bank confidences for a question.
    Retrieve(QueryArgs),
    /// Answer a question from the retrieved evidence.
    Ask(QueryArgs),
    /// Report corpus and index state.
    Status,
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    /// Directory of extracted `.txt` documents, or a `.jsonl` file of chunks.
    pub path: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    pub query: String,

    /// Defaults to `retrieval.default_top_k`.
    #[arg(long)]
    pub top_k: Option<usize>,

    #[arg(long, value_enum, default_value_t = ModeArg::Hybrid)]
    pub mode: ModeArg,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ModeArg {
    Hybrid,
    Semantic,
    Lexical,
}

impl From<ModeArg> for RetrievalMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Hybrid => RetrievalMode::Hybrid,
            ModeArg::Semantic => RetrievalMode::Semantic,
            ModeArg::Lexical => RetrievalMode::Lexical,
        }
    }
}
