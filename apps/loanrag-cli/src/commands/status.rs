use anyhow::Result;
use tracing::{info, warn};

use loanrag_core::traits::LexicalBackend;

use crate::app::App;

pub async fn run() -> Result<()> {
    let app = App::open().await?;
    let corpus = app.retriever.corpus();

    info!(chunks = corpus.len(), snapshot = %app.snapshot_path.display(), "corpus");
    if app.lexical.is_available() {
        info!(version = %app.lexical.version().unwrap_or_default(), root = %app.lexical.root().display(), "lexical index");
    } else {
        warn!(root = %app.lexical.root().display(), "lexical index unavailable; hybrid queries will use semantic hits only");
    }
    info!(
        store = %app.semantic.store().describe(),
        namespace = %app.semantic.namespace(),
        mapped = app.semantic.mapped(),
        "semantic backend"
    );
    Ok(())
}
