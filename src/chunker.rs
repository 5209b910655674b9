//! Chunker (§4.B): splits a file's text into overlapping, line-anchored chunks.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::types::Chunk;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkParams {
    /// Target chunk size, in source lines.
    pub max_lines: usize,
    /// Lines of overlap carried from the tail of one chunk into the next.
    pub overlap_lines: usize,
    /// Soft character cap; a chunk is flushed early if it would exceed this,
    /// even if `max_lines` hasn't been reached (guards against minified files).
    pub max_chars: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self { max_lines: 80, overlap_lines: 10, max_chars: 4000 }
    }
}

fn import_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(import|from|#include|require\s*\(|use\s+)").unwrap())
}

fn has_imports(content: &str) -> bool {
    content.lines().any(|l| import_line_re().is_match(l))
}

fn file_ext(path: &str) -> String {
    match path.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && !ext.contains('/') => format!(".{}", ext.to_ascii_lowercase()),
        _ => String::new(),
    }
}

/// First 8 KiB contain a `\0` byte → treat as binary and skip entirely.
fn looks_binary(text: &str) -> bool {
    text.as_bytes().iter().take(8192).any(|&b| b == 0)
}

/// Split `content` (the full text of `file_path`) into deterministic,
/// line-anchored, overlapping chunks.
///
/// Empty/whitespace-only and binary files yield zero chunks. Boundaries are a
/// simple fixed-size sliding window over lines, bounded additionally by
/// `max_chars` so a single enormous line (minified code) can't produce an
/// unbounded chunk; the same file always produces byte-identical chunks.
pub fn chunk_file(file_path: &str, content: &str, params: ChunkParams) -> Vec<Chunk> {
    if looks_binary(content) || content.trim().is_empty() {
        return Vec::new();
    }

    let max_lines = params.max_lines.max(1);
    let overlap = params.overlap_lines.min(max_lines.saturating_sub(1));
    let max_chars = params.max_chars.max(1);
    let ext = file_ext(file_path);

    let lines: Vec<&str> = content.lines().collect();
    let total = lines.len();
    let mut chunks = Vec::new();

    let mut start = 0usize;
    while start < total {
        let mut end = (start + max_lines).min(total);

        // Shrink the window if it would exceed the character budget, but
        // always keep at least one line so we make forward progress.
        while end > start + 1 {
            let size: usize = lines[start..end].iter().map(|l| l.len() + 1).sum();
            if size <= max_chars {
                break;
            }
            end -= 1;
        }

        let body = lines[start..end].join("\n");
        chunks.push(Chunk {
            file_path: file_path.to_string(),
            start_line: (start + 1) as u32,
            end_line: end as u32,
            has_imports: has_imports(&body),
            content: body,
            file_ext: ext.clone(),
        });

        if end >= total {
            break;
        }
        let next_start = end.saturating_sub(overlap);
        start = if next_start > start { next_start } else { end };
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_no_chunks() {
        assert!(chunk_file("a.rs", "   \n\n", ChunkParams::default()).is_empty());
    }

    #[test]
    fn binary_file_is_skipped() {
        let content = format!("line one\0{}", "x".repeat(100));
        assert!(chunk_file("a.bin", &content, ChunkParams::default()).is_empty());
    }

    #[test]
    fn chunks_cover_every_line_with_exact_ranges() {
        let content: String = (1..=200).map(|i| format!("line{i}")).collect::<Vec<_>>().join("\n");
        let params = ChunkParams { max_lines: 50, overlap_lines: 5, max_chars: 100_000 };
        let chunks = chunk_file("f.rs", &content, params);

        let lines: Vec<&str> = content.lines().collect();
        for c in &chunks {
            let expected = lines[(c.start_line - 1) as usize..c.end_line as usize].join("\n");
            assert_eq!(c.content, expected);
        }
        // last chunk reaches the end of file
        assert_eq!(chunks.last().unwrap().end_line as usize, lines.len());
    }

    #[test]
    fn successive_chunks_overlap() {
        let content: String = (1..=200).map(|i| format!("line{i}")).collect::<Vec<_>>().join("\n");
        let params = ChunkParams { max_lines: 50, overlap_lines: 5, max_chars: 100_000 };
        let chunks = chunk_file("f.rs", &content, params);
        for w in chunks.windows(2) {
            assert!(w[1].start_line <= w[0].end_line);
        }
    }

    #[test]
    fn deterministic_across_runs() {
        let content: String = (1..=500).map(|i| format!("fn item_{i}() {{}}")).collect::<Vec<_>>().join("\n");
        let a = chunk_file("f.rs", &content, ChunkParams::default());
        let b = chunk_file("f.rs", &content, ChunkParams::default());
        assert_eq!(a, b);
    }

    #[test]
    fn detects_import_lines() {
        let content = "use std::fs;\n\nfn main() {}\n";
        let chunks = chunk_file("f.rs", content, ChunkParams::default());
        assert!(chunks[0].has_imports);
    }
}
