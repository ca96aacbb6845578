use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use loanrag_answer::{AnswerOrchestrator, GeminiGenerator};

use crate::app::App;
use crate::cli::QueryArgs;

pub async fn run(args: QueryArgs) -> Result<()> {
    let app = App::open().await?;
    let generator = Arc::new(GeminiGenerator::from_settings(&app.settings.llm)?);
    let timeout = Duration::from_millis(app.settings.llm.timeout_ms);
    let orchestrator = AnswerOrchestrator::new(Arc::clone(&app.retriever), generator, timeout);

    let top_k = app.top_k(args.top_k);
    let answer = orchestrator.ask(&args.query, top_k, args.mode.into()).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
        return Ok(());
    }

    println!("{}", answer.answer);
    if !answer.citations.is_empty() {
        println!();
        println!("Sources:");
        for c in &answer.citations {
            println!("  {} (p{}, confidence {:.2})  {}", c.bank, c.page, c.score, c.source);
        }
    }
    Ok(())
}
