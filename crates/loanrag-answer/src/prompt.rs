use loanrag_core::types::Chunk;

/// Answer given when retrieval finds nothing or generation fails.
pub const NOT_FOUND_ANSWER: &str = "I couldn\u{2019}t find this in the provided documents.";

/// Phrase the model is told to use for details the context does not state.
pub const GAP_PHRASE: &str = "Not specified in the provided documents.";

pub const MAX_CONTEXT_BLOCKS: usize = 8;

/// `[{bank} | p{page}]` header followed by the chunk text.
pub fn context_block(chunk: &Chunk) -> String {
    format!("[{} | p{}]\n{}", chunk.bank, chunk.page, chunk.text)
}

/// Grounded prompt over at most [`MAX_CONTEXT_BLOCKS`] non-blank chunks, in
/// the order given.
pub fn build_prompt<'a>(question: &str, evidence: impl IntoIterator<Item = &'a Chunk>) -> String {
    let blocks: Vec<String> = evidence
        .into_iter()
        .filter(|c| !c.text.trim().is_empty())
        .take(MAX_CONTEXT_BLOCKS)
        .map(context_block)
        .collect();
    format!(
        "You are a helpful, precise assistant. Answer only using the CONTEXT below.\n\
         If something is not stated in the context, say: \"{GAP_PHRASE}\"\n\
         Do not invent banks, figures, policies, dates, or fees.\n\
         \n\
         Formatting rules:\n\
         - No code fences, no JSON, no markdown backticks.\n\
         - Use short paragraphs and bullet points.\n\
         - If multiple banks appear, show bank-wise bullets like: \"\u{2022} Axis Bank: \u{2026}\"\n\
         - Write numbers with units (e.g., 9.65% p.a., \u{20b9}10,000 + GST).\n\
         - Keep it concise and clear for a layperson; add a one-line summary at the end.\n\
         \n\
         QUESTION:\n\
         {question}\n\
         \n\
         CONTEXT:\n\
         {}",
        blocks.join("\n")
    )
}
