//! Similarity search over one index snapshot.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::RagConfig;
use crate::document::{Chunk, SearchResult};
use crate::embedding::{EmbeddingProvider, embed_checked};
use crate::error::Result;
use crate::index::IndexHandle;

/// A read-only view bound to one [`IndexHandle`].
///
/// Rebind by constructing a new `Retriever` whenever the index is rebuilt or
/// reloaded.
#[derive(Clone)]
pub struct Retriever {
    index: IndexHandle,
    embedder: Arc<dyn EmbeddingProvider>,
    top_k: usize,
    similarity_threshold: Option<f32>,
    embedding_timeout: Duration,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("generation", &self.index.generation())
            .field("entries", &self.index.len())
            .field("embedder", &self.embedder.name())
            .field("top_k", &self.top_k)
            .field("similarity_threshold", &self.similarity_threshold)
            .finish()
    }
}

impl Retriever {
    /// Bind to `index` with default settings.
    pub fn new(index: IndexHandle, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self::from_config(index, embedder, &RagConfig::default())
    }

    /// Bind to `index` using the retrieval settings of `config`.
    pub fn from_config(index: IndexHandle, embedder: Arc<dyn EmbeddingProvider>, config: &RagConfig) -> Self {
        Self {
            index,
            embedder,
            top_k: config.top_k,
            similarity_threshold: config.similarity_threshold,
            embedding_timeout: config.embedding_timeout,
        }
    }

    pub fn index(&self) -> &IndexHandle {
        &self.index
    }

    /// Default number of results.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// The `k` chunks most similar to `query` with their scores, best first.
    ///
    /// An empty index yields an empty result without embedding the query.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        if self.index.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut embeddings = embed_checked(self.embedder.as_ref(), &[query], self.embedding_timeout).await?;
        let query_embedding = embeddings.pop().unwrap_or_default();

        let mut results = self.index.search(&query_embedding, k);
        if let Some(threshold) = self.similarity_threshold {
            results.retain(|result| result.score >= threshold);
        }

        debug!(k, returned = results.len(), "retrieved chunks");
        Ok(results)
    }

    /// The `k` chunks most similar to `query`, best first, ties in insertion
    /// order.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Chunk>> {
        Ok(self.search(query, k).await?.into_iter().map(|result| result.chunk).collect())
    }

    /// [`retrieve`](Self::retrieve) with the configured `top_k`.
    pub async fn retrieve_default(&self, query: &str) -> Result<Vec<Chunk>> {
        self.retrieve(query, self.top_k).await
    }
}
