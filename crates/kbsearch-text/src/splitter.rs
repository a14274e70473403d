//! Recursive, separator-hierarchy text chunker.
//!
//! Splits on the highest-priority separator present in the text, recurses
//! into oversized pieces with the remaining separators, merges adjacent
//! pieces back up to the chunk budget, then prepends an overlap window to
//! every chunk after the first. Chunks are contiguous substrings of the
//! input (separators are kept), so concatenating chunk contents minus the
//! overlaps reconstructs the original text.

use kbsearch_core::types::{Chunk, ChunkMetadata, Meta};
use std::sync::Arc;

/// Measures text length for budgeting. Default counts chars so CJK text
/// is not penalized by UTF-8 byte width.
pub type LengthFn = Arc<dyn Fn(&str) -> usize + Send + Sync>;

#[derive(Debug, Clone)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self { chunk_size: 500, chunk_overlap: 50 }
    }
}

impl SplitterConfig {
    /// Larger budget for source code, where declarations run long.
    pub fn code() -> Self {
        Self { chunk_size: 800, chunk_overlap: 100 }
    }
}

pub struct TextSplitter {
    config: SplitterConfig,
    separators: Vec<&'static str>,
    length: LengthFn,
}

const BASE_SEPARATORS: &[&str] = &["\n\n", "\n", "。", "！", "？", ". ", "! ", "? ", " ", ""];

impl TextSplitter {
    pub fn new(config: SplitterConfig) -> Self {
        Self {
            config,
            separators: BASE_SEPARATORS.to_vec(),
            length: Arc::new(|s: &str| s.chars().count()),
        }
    }

    /// Heading-aware variant: prefers to break at Markdown section starts.
    pub fn markdown(config: SplitterConfig) -> Self {
        let mut separators = vec!["\n# ", "\n## ", "\n### ", "\n#### "];
        separators.extend_from_slice(BASE_SEPARATORS);
        Self { separators, ..Self::new(config) }
    }

    /// Declaration-aware variant for source files.
    pub fn code(config: SplitterConfig) -> Self {
        let mut separators =
            vec!["\nclass ", "\nfunction ", "\ndef ", "\npub fn ", "\nfn ", "\npublic ", "\nimpl "];
        separators.extend_from_slice(BASE_SEPARATORS);
        Self { separators, ..Self::new(config) }
    }

    pub fn with_length_fn(mut self, length: LengthFn) -> Self {
        self.length = length;
        self
    }

    fn len(&self, s: &str) -> usize {
        (self.length)(s)
    }

    /// Split without offset tracking.
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        self.split_inner(text, &Meta::new(), false)
    }

    /// Split and record `start_offset`/`end_offset` (in chars) per chunk.
    pub fn split_with_offsets(&self, text: &str) -> Vec<Chunk> {
        self.split_inner(text, &Meta::new(), true)
    }

    /// Split carrying document metadata into every chunk.
    pub fn split_with_metadata(&self, text: &str, extra: &Meta) -> Vec<Chunk> {
        self.split_inner(text, extra, false)
    }

    fn split_inner(&self, text: &str, extra: &Meta, offsets: bool) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut pieces: Vec<(String, usize)> = Vec::new();
        self.recurse(text, 0, &self.separators, &mut pieces);
        let merged = self.merge(pieces);
        let windows = self.apply_overlap(merged);

        let total = windows.len();
        windows
            .into_iter()
            .enumerate()
            .map(|(i, (content, start))| {
                let char_len = content.chars().count();
                let metadata = ChunkMetadata {
                    chunk_index: i,
                    total_chunks: total,
                    chunk_size: char_len,
                    start_offset: offsets.then_some(start),
                    end_offset: offsets.then_some(start + char_len),
                    extra: extra.clone(),
                };
                Chunk { content, metadata }
            })
            .collect()
    }

    /// Depth-first descent: `start` is the char offset of `text` in the
    /// original input.
    fn recurse(&self, text: &str, start: usize, seps: &[&'static str], out: &mut Vec<(String, usize)>) {
        if self.len(text) <= self.config.chunk_size {
            out.push((text.to_string(), start));
            return;
        }
        let Some((idx, sep)) = seps
            .iter()
            .enumerate()
            .find(|(_, s)| !s.is_empty() && text.contains(**s))
            .map(|(i, s)| (i, *s))
        else {
            self.hard_split(text, start, out);
            return;
        };

        let rest = &seps[idx + 1..];
        let mut piece_start = start;
        for piece in split_keep(text, sep) {
            let piece_chars = piece.chars().count();
            if self.len(piece) > self.config.chunk_size {
                self.recurse(piece, piece_start, rest, out);
            } else {
                out.push((piece.to_string(), piece_start));
            }
            piece_start += piece_chars;
        }
    }

    /// Last resort: cut at the character boundary.
    fn hard_split(&self, text: &str, start: usize, out: &mut Vec<(String, usize)>) {
        let size = self.config.chunk_size.max(1);
        let chars: Vec<char> = text.chars().collect();
        let mut pos = 0;
        while pos < chars.len() {
            let end = (pos + size).min(chars.len());
            out.push((chars[pos..end].iter().collect(), start + pos));
            pos = end;
        }
    }

    /// Greedily re-join adjacent pieces while they fit the budget.
    fn merge(&self, pieces: Vec<(String, usize)>) -> Vec<(String, usize)> {
        let mut merged: Vec<(String, usize)> = Vec::new();
        for (piece, start) in pieces {
            match merged.last_mut() {
                Some((current, _))
                    if self.len(current) + self.len(&piece) <= self.config.chunk_size =>
                {
                    current.push_str(&piece);
                }
                _ => merged.push((piece, start)),
            }
        }
        merged
    }

    /// Prefix each chunk after the first with the tail of its predecessor.
    fn apply_overlap(&self, chunks: Vec<(String, usize)>) -> Vec<(String, usize)> {
        if self.config.chunk_overlap == 0 || chunks.len() < 2 {
            return chunks;
        }
        let mut out: Vec<(String, usize)> = Vec::with_capacity(chunks.len());
        for (i, (content, start)) in chunks.iter().enumerate() {
            if i == 0 {
                out.push((content.clone(), *start));
                continue;
            }
            let prev: Vec<char> = chunks[i - 1].0.chars().collect();
            let take = self.config.chunk_overlap.min(prev.len());
            let overlap: String = prev[prev.len() - take..].iter().collect();
            out.push((format!("{overlap}{content}"), start - take));
        }
        out
    }
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(SplitterConfig::default())
    }
}

/// Split keeping the separator attached to the end of each piece so the
/// pieces concatenate back to the input.
fn split_keep<'a>(text: &'a str, sep: &str) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut last = 0;
    while let Some(pos) = text[last..].find(sep) {
        let end = last + pos + sep.len();
        out.push(&text[last..end]);
        last = end;
    }
    if last < text.len() {
        out.push(&text[last..]);
    }
    out
}
