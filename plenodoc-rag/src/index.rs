//! In-memory similarity structure over embedded chunks.
//!
//! A [`VectorIndex`] is an append-only list of (chunk, embedding) entries
//! searched exhaustively by cosine similarity. Entries keep insertion order,
//! which is the tie-breaker for equal scores. An [`IndexHandle`] is an
//! immutable, cheaply cloneable snapshot of a persisted index.

use std::collections::{BTreeSet, HashSet};
use std::ops::Deref;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::{Chunk, SearchResult};

/// One indexed chunk with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// The similarity structure plus the metadata needed to validate it on load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorIndex {
    embedding_model: String,
    dimensions: usize,
    generation: u64,
    updated_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// An empty index for vectors of `dimensions` components from `embedding_model`.
    pub fn new(embedding_model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            embedding_model: embedding_model.into(),
            dimensions,
            generation: 0,
            updated_at: Utc::now(),
            entries: Vec::new(),
        }
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Incremented on every persisted mutation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// File names of every document with at least one indexed chunk.
    pub fn sources(&self) -> BTreeSet<String> {
        self.entries.iter().map(|entry| entry.chunk.source.clone()).collect()
    }

    pub(crate) fn extend(&mut self, chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) {
        self.entries.extend(
            chunks.into_iter().zip(embeddings).map(|(chunk, embedding)| IndexEntry { chunk, embedding }),
        );
    }

    /// Drop every entry whose chunk came from one of `sources`. Returns the
    /// number of entries removed.
    pub(crate) fn remove_sources(&mut self, sources: &BTreeSet<String>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| !sources.contains(&entry.chunk.source));
        before - self.entries.len()
    }

    pub(crate) fn stamp(&mut self, generation: u64) {
        self.generation = generation;
        self.updated_at = Utc::now();
    }

    /// Check the structural invariants: every embedding has the declared
    /// dimensionality and chunk IDs are unique.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.dimensions == 0 {
            return Err("dimensions must be greater than zero".to_string());
        }
        let mut ids = HashSet::with_capacity(self.entries.len());
        for (position, entry) in self.entries.iter().enumerate() {
            if entry.embedding.len() != self.dimensions {
                return Err(format!(
                    "entry {position} ('{}') has {} dimensions, expected {}",
                    entry.chunk.id,
                    entry.embedding.len(),
                    self.dimensions
                ));
            }
            if !ids.insert(entry.chunk.id.as_str()) {
                return Err(format!("duplicate chunk id '{}'", entry.chunk.id));
            }
        }
        Ok(())
    }

    /// The `top_k` entries most similar to `query`, by descending cosine
    /// similarity. Equal scores keep insertion order.
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<SearchResult> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| {
                let score = cosine_similarity(&entry.embedding, query);
                (position, if score.is_nan() { f32::NEG_INFINITY } else { score })
            })
            .collect();

        // Stable sort: ties stay in insertion order. NaN scores rank last.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        scored
            .into_iter()
            .map(|(position, score)| SearchResult { chunk: self.entries[position].chunk.clone(), score })
            .collect()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// An immutable snapshot of a persisted [`VectorIndex`].
///
/// Handles are produced only by [`IndexStore`](crate::IndexStore) after the
/// snapshot has been saved (or loaded), so a handle never shows a partially
/// built index. Each handle records the store's mutation epoch at the time
/// it was produced; [`IndexStore::is_current`](crate::IndexStore::is_current)
/// compares it against the latest one.
#[derive(Debug, Clone)]
pub struct IndexHandle {
    index: Arc<VectorIndex>,
    epoch: u64,
}

impl IndexHandle {
    pub(crate) fn new(index: VectorIndex, epoch: u64) -> Self {
        Self { index: Arc::new(index), epoch }
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether two handles point at the same snapshot.
    pub fn same_snapshot(&self, other: &IndexHandle) -> bool {
        Arc::ptr_eq(&self.index, &other.index)
    }
}

impl Deref for IndexHandle {
    type Target = VectorIndex;

    fn deref(&self) -> &Self::Target {
        &self.index
    }
}
