//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`RecursiveChunker`], which
//! splits text into bounded, overlapping passages, preferring natural
//! boundaries: paragraph, then sentence, then word, then a hard character cut.
//!
//! Every chunk is an exact character range of its document, so dropping the
//! overlapping prefix of each chunk after the first and concatenating the rest
//! rebuilds the document text.

use crate::config::RagConfig;
use crate::document::{CHUNK_INDEX_KEY, Chunk, Document, START_OFFSET_KEY};
use crate::error::{RagError, Result};

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has no non-whitespace text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;

    /// Split a batch of documents, preserving document order.
    fn chunk_all(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|document| self.chunk(document)).collect()
    }
}

/// Splits text hierarchically: paragraphs → sentences → words → characters.
///
/// Sizes are measured in characters, not bytes. Each chunk is at most
/// `chunk_size` characters long and shares at least `chunk_overlap`
/// characters with the previous chunk of the same document. Chunk IDs are
/// `{document_id}_{chunk_index}`.
///
/// # Example
///
/// ```rust,ignore
/// use plenodoc_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(1000, 150)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Create a chunker from the pipeline configuration.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Compute the `[start, end)` character spans of the chunks of `chars`.
    fn spans(&self, chars: &[char]) -> Vec<(usize, usize)> {
        let total = chars.len();
        let mut spans = Vec::new();
        if total == 0 {
            return spans;
        }

        // How far back the start of an overlap may move to land on a word.
        let max_snap = (self.chunk_size - self.chunk_overlap) / 4;
        let mut start = 0;
        let mut min_end = 0;

        loop {
            if total - start <= self.chunk_size {
                spans.push((start, total));
                return spans;
            }

            let lo = (start + self.chunk_overlap).max(min_end);
            let hi = start + self.chunk_size;
            let end = find_break(chars, lo, hi);
            spans.push((start, end));

            let overlap_start = end - self.chunk_overlap;
            let floor = overlap_start.saturating_sub(max_snap).max(start + 1);
            start = (floor..=overlap_start)
                .rev()
                .find(|&q| q == 0 || chars[q - 1].is_whitespace())
                .unwrap_or(overlap_start);
            min_end = end;
        }
    }
}

/// Latest break position in `(lo, hi]`, trying each boundary kind in order of
/// preference. A break at `p` ends the chunk just before `chars[p]`.
fn find_break(chars: &[char], lo: usize, hi: usize) -> usize {
    let boundaries: [fn(&[char], usize) -> bool; 3] =
        [is_paragraph_break, is_sentence_break, is_word_break];
    for is_break in boundaries {
        if let Some(p) = (lo + 1..=hi).rev().find(|&p| is_break(chars, p)) {
            return p;
        }
    }
    hi
}

fn is_paragraph_break(chars: &[char], p: usize) -> bool {
    p >= 2 && chars[p - 1] == '\n' && chars[p - 2] == '\n'
}

fn is_sentence_break(chars: &[char], p: usize) -> bool {
    p >= 2 && chars[p - 1].is_whitespace() && matches!(chars[p - 2], '.' | '!' | '?')
}

fn is_word_break(chars: &[char], p: usize) -> bool {
    p >= 1 && chars[p - 1].is_whitespace()
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.text.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = document.text.chars().collect();
        self.spans(&chars)
            .into_iter()
            .enumerate()
            .map(|(i, (start, end))| {
                let mut metadata = document.metadata.clone();
                metadata.insert(CHUNK_INDEX_KEY.to_string(), i.to_string());
                metadata.insert(START_OFFSET_KEY.to_string(), start.to_string());
                Chunk {
                    id: format!("{}_{i}", document.id),
                    text: chars[start..end].iter().collect(),
                    document_id: document.id.clone(),
                    source: document.source.clone(),
                    start_offset: start,
                    end_offset: end,
                    metadata,
                }
            })
            .collect()
    }
}

/// Split `documents` into chunks of at most `chunk_size` characters with
/// `chunk_overlap` characters of overlap.
///
/// # Errors
///
/// Returns [`RagError::Config`] for invalid size parameters.
pub fn split(documents: &[Document], chunk_size: usize, chunk_overlap: usize) -> Result<Vec<Chunk>> {
    Ok(RecursiveChunker::new(chunk_size, chunk_overlap)?.chunk_all(documents))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document::new("doc.txt", text)
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunker = RecursiveChunker::new(1000, 150).unwrap();
        let chunks = chunker.chunk(&doc("The sky is blue. Grass is green."));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "The sky is blue. Grass is green.");
        assert_eq!(chunks[0].id, "doc.txt_0");
        assert_eq!(chunks[0].metadata.get("source").map(String::as_str), Some("doc.txt"));
    }

    #[test]
    fn blank_text_yields_nothing() {
        let chunker = RecursiveChunker::new(10, 2).unwrap();
        assert!(chunker.chunk(&doc("")).is_empty());
        assert!(chunker.chunk(&doc(" \n\n ")).is_empty());
    }

    #[test]
    fn prefers_paragraph_then_sentence_boundaries() {
        let chunker = RecursiveChunker::new(40, 0).unwrap();
        let text = "First paragraph here.\n\nSecond one is a bit longer. It has two sentences.";
        let chunks = chunker.chunk(&doc(text));
        assert_eq!(chunks[0].text, "First paragraph here.\n\n");
        assert_eq!(chunks[1].text, "Second one is a bit longer. ");
        assert_eq!(chunks[2].text, "It has two sentences.");
    }

    #[test]
    fn hard_cut_when_no_boundary_exists() {
        let chunker = RecursiveChunker::new(4, 1).unwrap();
        let chunks = chunker.chunk(&doc("abcdefghij"));
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn sizes_are_measured_in_characters() {
        let chunker = RecursiveChunker::new(3, 0).unwrap();
        let chunks = chunker.chunk(&doc("ééééé"));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "ééé");
        assert_eq!(chunks[1].text, "éé");
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        assert!(RecursiveChunker::new(10, 10).is_err());
        assert!(RecursiveChunker::new(0, 0).is_err());
    }
}
