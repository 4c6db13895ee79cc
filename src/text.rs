//! Text cleanup, structural splitting and chunking for ingestion.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Item markers at the start of a line: `1.`, `1.2.3.`, `а)`, `b)`, `•`, `-`, `*`.
static ITEM_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(\d+\.[\d.]*\s+|[а-яА-ЯёЁ]\)\s+|[a-zA-Z]\)\s+|[•\-*]\s+)")
        .expect("item marker regex is valid")
});
static BLANK_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("blank line regex is valid"));
static NEWLINES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n+").expect("newline regex is valid"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex is valid"));
static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title regex is valid")
});

/// Blocks this short carry no usable content.
const MIN_BLOCK_CHARS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    pub size: usize,
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            size: 1000,
            overlap: 200,
        }
    }
}

/// Collapse all whitespace runs to single spaces and trim.
pub fn clean_text(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}

/// Split a legal text into paragraphs and numbered, lettered or bulleted items.
pub fn split_into_blocks(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let markers: Vec<_> = ITEM_MARKER_RE.captures_iter(text).collect();
    let preamble_end = markers
        .first()
        .and_then(|c| c.get(0))
        .map(|m| m.start())
        .unwrap_or(text.len());

    let mut blocks: Vec<String> = BLANK_LINE_RE
        .split(&text[..preamble_end])
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();

    for (i, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(marker)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = markers
            .get(i + 1)
            .and_then(|c| c.get(0))
            .map(|m| m.start())
            .unwrap_or(text.len());
        let marker = marker.as_str().trim();
        let content = text[whole.end()..end].trim();
        if !marker.is_empty() && !content.is_empty() {
            blocks.push(format!("{} {}", marker, NEWLINES_RE.replace_all(content, " ")));
        }
    }

    blocks
        .into_iter()
        .map(|b| b.trim().to_string())
        .filter(|b| b.chars().count() > MIN_BLOCK_CHARS)
        .collect()
}

/// Char-bounded chunks of at most `size` chars overlapping by `overlap`,
/// preferring to break at whitespace.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let size = size.max(1);
    if chars.len() <= size {
        let t = text.trim();
        return if t.is_empty() { Vec::new() } else { vec![t.to_string()] };
    }
    let overlap = overlap.min(size / 2);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let mut end = (start + size).min(chars.len());
        if end < chars.len() {
            let floor = start + size / 2;
            if let Some(ws) = (floor..end).rev().find(|&i| chars[i].is_whitespace()) {
                end = ws;
            }
        }
        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        if end >= chars.len() {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }
    chunks
}

/// Structural blocks, with oversized blocks chunked and every piece cleaned.
pub fn blocks_for_ingest(text: &str, cfg: ChunkConfig) -> Vec<String> {
    split_into_blocks(text)
        .iter()
        .flat_map(|block| chunk_text(block, cfg.size, cfg.overlap))
        .map(|piece| clean_text(&piece))
        .filter(|piece| piece.chars().count() > MIN_BLOCK_CHARS)
        .collect()
}

pub fn html_to_text(html: &[u8]) -> String {
    html2text::from_read(html, 120).unwrap_or_else(|_| String::from_utf8_lossy(html).to_string())
}

pub fn page_title(html: &str) -> Option<String> {
    TITLE_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| clean_text(m.as_str()))
        .filter(|t| !t.is_empty())
}
