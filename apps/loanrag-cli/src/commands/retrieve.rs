use anyhow::Result;

use crate::app::App;
use crate::cli::QueryArgs;

pub async fn run(args: QueryArgs) -> Result<()> {
    let app = App::open().await?;
    let top_k = app.top_k(args.top_k);
    let retrieval = app.retriever.retrieve(&args.query, top_k, args.mode.into()).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&retrieval)?);
        return Ok(());
    }

    println!("mode: {}", retrieval.mode);
    if let Some(d) = &retrieval.degradation {
        println!("degraded: {d:?}");
    }
    if retrieval.is_empty() {
        println!("no evidence found");
        return Ok(());
    }
    for (i, (result, chunk)) in retrieval.evidence().enumerate() {
        let ranks = result.contributing_ranks;
        println!(
            "{:>2}. {:.4}  {}  [{} | p{}]  lexical={}  semantic={}",
            i + 1,
            result.fused_score,
            chunk.id,
            chunk.bank,
            chunk.page,
            ranks.lexical.map_or("-".to_string(), |r| r.to_string()),
            ranks.semantic.map_or("-".to_string(), |r| r.to_string()),
        );
    }
    println!();
    for c in &retrieval.citations {
        println!("  {}  p{}  {:.2}  {}", c.bank, c.page, c.score, c.source);
    }
    Ok(())
}
