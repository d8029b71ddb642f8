//! Data types for documents, chunks, and search results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Metadata key holding the originating file name.
pub const SOURCE_KEY: &str = "source";
/// Metadata key holding the 1-based page number (paged formats).
pub const PAGE_KEY: &str = "page";
/// Metadata key holding the 1-based data row number (tabular formats).
pub const ROW_KEY: &str = "row";
/// Metadata key holding the chunk's position within its document.
pub const CHUNK_INDEX_KEY: &str = "chunk_index";
/// Metadata key holding the chunk's start offset, in characters.
pub const START_OFFSET_KEY: &str = "start_offset";

/// A unit of source text produced by the loader.
///
/// One file yields one or more documents (one per page or row for paged and
/// tabular formats). Documents are never mutated after loading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    /// Unique identifier: the source file name plus the unit position.
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// The file name in the document set this text came from.
    pub source: String,
    /// Key-value metadata (`source`, plus `page` or `row` when applicable).
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    /// A document covering a whole file.
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        let source = source.into();
        let mut metadata = BTreeMap::new();
        metadata.insert(SOURCE_KEY.to_string(), source.clone());
        Self { id: source.clone(), text: text.into(), source, metadata }
    }

    /// A document covering one numbered unit (page, row, ...) of a file.
    pub fn unit(
        source: impl Into<String>,
        key: &str,
        number: usize,
        text: impl Into<String>,
    ) -> Self {
        let mut document = Self::new(source, text);
        document.id = format!("{}#{key}{number}", document.source);
        document.metadata.insert(key.to_string(), number.to_string());
        document
    }
}

/// A bounded passage of a [`Document`]: the unit of embedding and retrieval.
///
/// `start_offset..end_offset` is the character range the chunk covers in its
/// parent document; adjacent chunks of one document overlap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Unique identifier: `{document_id}_{chunk_index}`.
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// The file name in the document set this chunk came from.
    pub source: String,
    /// Character offset of the first character in the parent document.
    pub start_offset: usize,
    /// Character offset one past the last character in the parent document.
    pub end_offset: usize,
    /// Metadata inherited from the parent document plus chunk-specific fields.
    pub metadata: BTreeMap<String, String>,
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The cosine similarity to the query (higher is more relevant).
    pub score: f32,
}
