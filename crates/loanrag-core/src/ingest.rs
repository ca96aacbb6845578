//! Chunk producer for extracted policy documents.
//!
//! Input is a directory of `.txt` files, one per source PDF, with pages
//! separated by form feeds as emitted by PDF text extraction. Each page is
//! split into overlapping character windows that prefer paragraph, line,
//! sentence and word boundaries. A JSONL file of ready-made `Chunk` records is
//! accepted as well.

use anyhow::{Context, Result};
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::IngestSettings;
use crate::types::Chunk;

const PAGE_BREAK: char = '\x0c';
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 800, chunk_overlap: 120 }
    }
}

impl From<&IngestSettings> for ChunkingConfig {
    fn from(s: &IngestSettings) -> Self {
        Self { chunk_size: s.chunk_size, chunk_overlap: s.chunk_overlap }
    }
}

#[derive(Default)]
pub struct DocumentProcessor {
    chunking_config: ChunkingConfig,
}

impl DocumentProcessor {
    pub fn new() -> Self { Self::default() }

    pub fn with_config(chunking_config: ChunkingConfig) -> Self { Self { chunking_config } }

    /// Chunk every `.txt` file under `data_dir`, in sorted path order.
    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<Chunk>> {
        let files = self.list_txt_files(data_dir);
        if files.is_empty() {
            warn!(dir = %data_dir.display(), "no .txt files found");
            return Ok(vec![]);
        }
        let mut all_chunks = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            debug!(file = %file_path.display(), "processing file {}/{}", file_index + 1, files.len());
            let content = self.read_file_content(file_path)?;
            all_chunks.extend(self.chunk_file(&content, file_path, data_dir));
        }
        info!(files = files.len(), chunks = all_chunks.len(), "processed documents");
        Ok(all_chunks)
    }

    /// Read newline-delimited `Chunk` JSON records, skipping blank lines.
    pub fn load_jsonl(&self, path: &Path) -> Result<Vec<Chunk>> {
        let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
        let mut chunks = Vec::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() { continue; }
            let chunk: Chunk = serde_json::from_str(&line)
                .with_context(|| format!("{}:{}: invalid chunk record", path.display(), line_no + 1))?;
            chunks.push(chunk);
        }
        info!(chunks = chunks.len(), file = %path.display(), "loaded chunk records");
        Ok(chunks)
    }

    pub fn chunk_document(&self, content: &str, file_path: &Path) -> Vec<Chunk> {
        self.chunk_file(content, file_path, Path::new(""))
    }

    /// Chunk ids start with the file's path under `data_dir`, minus the
    /// extension, so equal file names in different folders stay distinct.
    fn chunk_file(&self, content: &str, file_path: &Path, data_dir: &Path) -> Vec<Chunk> {
        let file_name = file_path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        let relative_path = file_path.strip_prefix(data_dir).unwrap_or(file_path).with_extension("");
        let key = relative_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let bank = infer_bank_from_name(&file_name);
        let source_document = file_path.to_string_lossy().to_string();
        let mut chunks = Vec::new();
        for (page_index, page) in content.split(PAGE_BREAK).enumerate() {
            if page.trim().is_empty() { continue; }
            let page_no = u32::try_from(page_index + 1).unwrap_or(u32::MAX);
            for (n, text) in self.split_text(page).into_iter().enumerate() {
                chunks.push(Chunk {
                    id: format!("{}:p{}:{}", key, page_no, n),
                    text,
                    bank: bank.to_string(),
                    source_document: source_document.clone(),
                    page: page_no,
                });
            }
        }
        chunks
    }

    /// Split into windows of at most `chunk_size` chars with `chunk_overlap` chars carried over.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let size = self.chunking_config.chunk_size.max(1);
        let overlap = self.chunking_config.chunk_overlap.min(size.saturating_sub(1));
        let mut out = Vec::new();
        let mut start = 0usize;
        while start < chars.len() {
            let mut end = (start + size).min(chars.len());
            if end < chars.len() {
                if let Some(cut) = last_separator_end(&chars[start..end], size / 2) {
                    end = start + cut;
                }
            }
            let piece: String = chars[start..end].iter().collect();
            let piece = piece.trim();
            if !piece.is_empty() { out.push(piece.to_string()); }
            if end >= chars.len() { break; }
            let next = end.saturating_sub(overlap);
            start = if next > start { next } else { end };
        }
        out
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
        }
    }

    fn list_txt_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut txt_files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("txt") { txt_files.push(path.to_path_buf()); }
        }
        txt_files.sort();
        txt_files
    }
}

/// Offset just past the last occurrence of the highest-priority separator
/// that still leaves more than `min_cut` chars in the window.
fn last_separator_end(window: &[char], min_cut: usize) -> Option<usize> {
    for sep in SEPARATORS {
        let sep: Vec<char> = sep.chars().collect();
        if window.len() < sep.len() { continue; }
        let found = (0..=window.len() - sep.len()).rev().find(|&i| window[i..i + sep.len()] == sep[..]);
        match found {
            Some(i) if i + sep.len() > min_cut => return Some(i + sep.len()),
            _ => continue,
        }
    }
    None
}

/// Map a document file name to the issuing bank.
pub fn infer_bank_from_name(filename: &str) -> &'static str {
    let lower = filename.to_lowercase();
    if lower.contains("axis") { return "Axis Bank"; }
    if lower.contains("sbi") || lower.contains("state bank") { return "State Bank of India"; }
    if lower.contains("hdfc") { return "HDFC Bank"; }
    if lower.contains("icici") { return "ICICI Bank"; }
    if lower.contains("kotak") { return "Kotak Mahindra Bank"; }
    "Unknown"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_prefers_paragraph_boundaries() {
        let p = DocumentProcessor::with_config(ChunkingConfig { chunk_size: 40, chunk_overlap: 5 });
        let text = "First paragraph about LTV ratios.\n\nSecond paragraph about processing fees.";
        let pieces = p.split_text(text);
        assert_eq!(pieces[0], "First paragraph about LTV ratios.");
        assert!(pieces.iter().all(|s| s.chars().count() <= 40));
    }

    #[test]
    fn split_always_makes_progress() {
        let p = DocumentProcessor::with_config(ChunkingConfig { chunk_size: 10, chunk_overlap: 9 });
        let pieces = p.split_text(&"x".repeat(95));
        assert!(!pieces.is_empty());
        assert!(pieces.len() < 95);
    }
}
