//! Splitting documents into overlapping, boundary-aware chunks.
//!
//! Sizes are measured in characters (Unicode scalar values), so a chunk never
//! splits a multi-byte character. Consecutive chunks of one document share
//! exactly `overlap_size` characters; dropping that prefix from every chunk
//! after the first and concatenating gives back the original text.

use std::iter::FusedIterator;

use serde::{Deserialize, Serialize};

use crate::domain::{Chunk, Document, DomainError, Result};

const RANK_WORD: u8 = 0;
const RANK_SENTENCE: u8 = 1;
const RANK_LINE: u8 = 2;
const RANK_PARAGRAPH: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkerConfig {
    pub max_chunk_size: usize,
    pub overlap_size: usize,
    /// How far before the hard cut to look for a natural boundary.
    pub boundary_window: usize,
}

impl ChunkerConfig {
    pub fn new(max_chunk_size: usize, overlap_size: usize) -> Self {
        Self {
            max_chunk_size,
            overlap_size,
            boundary_window: max_chunk_size / 5,
        }
    }

    pub fn with_boundary_window(mut self, boundary_window: usize) -> Self {
        self.boundary_window = boundary_window;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_size == 0 {
            return Err(DomainError::invalid_config(
                "max_chunk_size must be greater than zero",
            ));
        }
        if self.overlap_size >= self.max_chunk_size {
            return Err(DomainError::invalid_config(format!(
                "overlap_size ({}) must be less than max_chunk_size ({})",
                self.overlap_size, self.max_chunk_size
            )));
        }
        Ok(())
    }
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self::new(1000, 200)
    }
}

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Lazily chunks a document. Call again to restart from the beginning.
    pub fn chunks<'a>(&self, document: &'a Document) -> Chunks<'a> {
        self.chunk_text(&document.id, &document.content)
    }

    pub fn chunk_text<'a>(&self, source_id: &'a str, text: &'a str) -> Chunks<'a> {
        let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        offsets.push(text.len());

        Chunks {
            source_id,
            text,
            offsets,
            config: self.config,
            next_start: Some(0),
            sequence_index: 0,
        }
    }
}

/// Iterator over the chunks of one document, produced on demand.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    source_id: &'a str,
    text: &'a str,
    /// Byte offset of every character, followed by `text.len()`.
    offsets: Vec<usize>,
    config: ChunkerConfig,
    next_start: Option<usize>,
    sequence_index: usize,
}

impl Chunks<'_> {
    fn char_count(&self) -> usize {
        self.offsets.len() - 1
    }

    fn char_at(&self, index: usize) -> char {
        self.text[self.offsets[index]..]
            .chars()
            .next()
            .unwrap_or('\0')
    }

    /// Ranks cutting just before character `cut`, or `None` for a mid-word cut.
    fn boundary_rank(&self, cut: usize) -> Option<u8> {
        let prev = self.char_at(cut - 1);
        let before_prev = if cut >= 2 { Some(self.char_at(cut - 2)) } else { None };

        if prev == '\n' {
            // A blank line, LF or CRLF, ends a paragraph. A markdown heading
            // starting right after the break counts as a section boundary.
            let blank_line = match before_prev {
                Some('\n') => true,
                Some('\r') => cut >= 3 && self.char_at(cut - 3) == '\n',
                _ => false,
            };
            if blank_line || self.char_at(cut) == '#' {
                return Some(RANK_PARAGRAPH);
            }
            return Some(RANK_LINE);
        }
        if prev.is_whitespace() {
            if matches!(before_prev, Some('.' | '!' | '?')) {
                return Some(RANK_SENTENCE);
            }
            return Some(RANK_WORD);
        }
        None
    }

    /// Picks the end of a chunk starting at `start` whose hard limit is
    /// `hard_end` (always inside the text here).
    fn cut_point(&self, start: usize, hard_end: usize) -> usize {
        // Cutting at or before `start + overlap` would stall the iterator.
        let floor = (start + self.config.overlap_size + 1)
            .max(hard_end.saturating_sub(self.config.boundary_window));

        let mut best: Option<(u8, usize)> = None;
        for cut in (floor..=hard_end).rev() {
            if let Some(rank) = self.boundary_rank(cut) {
                if best.map_or(true, |(best_rank, _)| rank > best_rank) {
                    best = Some((rank, cut));
                }
                if rank == RANK_PARAGRAPH {
                    break;
                }
            }
        }

        best.map_or(hard_end, |(_, cut)| cut)
    }
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let start = self.next_start?;
        let total = self.char_count();
        if start >= total {
            self.next_start = None;
            return None;
        }

        let hard_end = (start + self.config.max_chunk_size).min(total);
        let end = if hard_end == total {
            total
        } else {
            self.cut_point(start, hard_end)
        };

        let chunk = Chunk::new(
            self.source_id,
            &self.text[self.offsets[start]..self.offsets[end]],
            self.sequence_index,
            start,
            end,
        );

        self.sequence_index += 1;
        self.next_start = if end == total {
            None
        } else {
            Some(end - self.config.overlap_size)
        };

        Some(chunk)
    }
}

impl FusedIterator for Chunks<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn reassemble(chunks: &[Chunk], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(&chunk.text);
            } else {
                out.extend(chunk.text.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn test_chunk_content_single_chunk() {
        let chunker = Chunker::new(ChunkerConfig::new(100, 10)).unwrap();
        let doc = Document::new("bio.md", "Harsha is a software engineer in Bengaluru.");
        let chunks: Vec<_> = chunker.chunks(&doc).collect();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, doc.content);
        assert_eq!(chunks[0].sequence_index, 0);
        assert_eq!(chunks[0].char_start, 0);
        assert_eq!(chunks[0].char_end, doc.content.chars().count());
        assert_eq!(chunks[0].source_id, "bio.md");
    }

    #[test]
    fn test_chunk_content_multiple_chunks() {
        let chunker = Chunker::new(ChunkerConfig::new(30, 5)).unwrap();
        let content = "First paragraph here.\n\nSecond paragraph here.\n\nThird paragraph here.";
        let chunks: Vec<_> = chunker.chunk_text("doc", content).collect();

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.sequence_index, i);
            assert!(chunk.char_len() <= 30);
        }
        assert_eq!(reassemble(&chunks, 5), content);
    }

    #[test]
    fn test_chunk_content_empty() {
        let chunker = Chunker::new(ChunkerConfig::default()).unwrap();
        assert_eq!(chunker.chunk_text("doc", "").count(), 0);
    }

    #[test]
    fn test_prefers_paragraph_break() {
        let chunker = Chunker::new(ChunkerConfig::new(40, 4).with_boundary_window(20)).unwrap();
        let content = "Alpha beta gamma delta.\n\nEpsilon zeta eta theta iota kappa.";
        let first = chunker.chunk_text("doc", content).next().unwrap();

        assert_eq!(first.text, "Alpha beta gamma delta.\n\n");
    }

    #[test]
    fn test_crlf_blank_line_is_a_paragraph_break() {
        let chunker = Chunker::new(ChunkerConfig::new(40, 4).with_boundary_window(30)).unwrap();
        let content = "Alpha beta gamma.\r\n\r\nDelta epsilon\r\nzeta eta theta iota.";
        let first = chunker.chunk_text("doc", content).next().unwrap();

        assert_eq!(first.text, "Alpha beta gamma.\r\n\r\n");
    }

    #[test]
    fn test_prefers_sentence_over_word() {
        let chunker = Chunker::new(ChunkerConfig::new(30, 3).with_boundary_window(15)).unwrap();
        let content = "One two three. Four five six seven eight nine ten";
        let first = chunker.chunk_text("doc", content).next().unwrap();

        assert_eq!(first.text, "One two three. ");
    }

    #[test]
    fn test_hard_cut_without_boundary() {
        let chunker = Chunker::new(ChunkerConfig::new(10, 2)).unwrap();
        let content = "abcdefghijklmnopqrstuvwxyz";
        let chunks: Vec<_> = chunker.chunk_text("doc", content).collect();

        assert_eq!(chunks[0].text, "abcdefghij");
        assert_eq!(chunks[1].text, "ijklmnopqr");
        assert_eq!(chunks[1].char_start, 8);
        assert_eq!(reassemble(&chunks, 2), content);
    }

    #[test]
    fn test_multibyte_text_is_not_split_inside_a_character() {
        let chunker = Chunker::new(ChunkerConfig::new(7, 2)).unwrap();
        let content = "日本語のテキストを分割するテストです";
        let chunks: Vec<_> = chunker.chunk_text("doc", content).collect();

        assert!(chunks.iter().all(|c| c.text.chars().count() <= 7));
        assert_eq!(reassemble(&chunks, 2), content);
    }

    #[test]
    fn test_iterator_is_restartable() {
        let chunker = Chunker::new(ChunkerConfig::new(12, 3)).unwrap();
        let doc = Document::new("doc", "The quick brown fox jumps over the lazy dog.");
        let first: Vec<_> = chunker.chunks(&doc).collect();
        let second: Vec<_> = chunker.chunks(&doc).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_overlap_not_less_than_size_is_invalid() {
        assert!(matches!(
            Chunker::new(ChunkerConfig::new(100, 100)),
            Err(DomainError::InvalidConfig(_))
        ));
        assert!(matches!(
            Chunker::new(ChunkerConfig::new(0, 0)),
            Err(DomainError::InvalidConfig(_))
        ));
    }
}
