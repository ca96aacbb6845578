use loanrag_core::types::Chunk;

/// Stable identifier for a chunk sequence: the first 16 hex chars of a blake3
/// digest over every chunk's id and text, in order.
pub fn corpus_version(chunks: &[Chunk]) -> String {
	let mut hasher = blake3::Hasher::new();
	for c in chunks {
		hasher.update(c.id.as_bytes());
		hasher.update(&[0u8]);
		hasher.update(c.text.as_bytes());
		hasher.update(&[0xffu8]);
	}
	let hex = hasher.finalize().to_hex();
	hex.as_str()[..16].to_string()
}
