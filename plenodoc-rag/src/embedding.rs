//! Embedding provider trait for generating vector embeddings from text.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations must be deterministic for a fixed model: the same text
/// always maps to the same vector, which is what makes an incrementally grown
/// index equivalent to one built in a single pass. The default
/// [`embed_batch`](EmbeddingProvider::embed_batch) implementation calls
/// [`embed`](EmbeddingProvider::embed) sequentially; backends that support
/// native batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use plenodoc_rag::EmbeddingProvider;
///
/// let provider = HashingEmbedder::default();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier of the embedding model. Persisted with the index so that
    /// vectors from different models are never mixed.
    fn name(&self) -> &str;

    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}

/// Embed `texts` under a deadline, checking the count and dimensionality of
/// the result.
pub(crate) async fn embed_checked(
    provider: &dyn EmbeddingProvider,
    texts: &[&str],
    timeout: Duration,
) -> Result<Vec<Vec<f32>>> {
    let embeddings = tokio::time::timeout(timeout, provider.embed_batch(texts))
        .await
        .map_err(|_| RagError::EmbeddingFailed {
            provider: provider.name().to_string(),
            message: format!("timed out after {}s", timeout.as_secs()),
        })??;

    if embeddings.len() != texts.len() {
        return Err(RagError::EmbeddingFailed {
            provider: provider.name().to_string(),
            message: format!("expected {} embeddings, got {}", texts.len(), embeddings.len()),
        });
    }
    if let Some(bad) = embeddings.iter().find(|e| e.len() != provider.dimensions()) {
        return Err(RagError::EmbeddingFailed {
            provider: provider.name().to_string(),
            message: format!(
                "expected {} dimensions, got {}",
                provider.dimensions(),
                bad.len()
            ),
        });
    }
    Ok(embeddings)
}

/// A local, deterministic embedder based on feature hashing.
///
/// Each lowercase alphanumeric token is hashed (FNV-1a) into one of
/// `dimensions` buckets with a hash-derived sign, and the resulting vector is
/// L2-normalized. It needs no network and no accelerator, which makes it the
/// default for offline use and for tests; semantic quality is that of a bag
/// of words.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
    name: String,
}

impl HashingEmbedder {
    /// Default dimensionality.
    pub const DEFAULT_DIMENSIONS: usize = 384;

    /// Create an embedder producing vectors of `dimensions` components.
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self { dimensions, name: format!("hashing-{dimensions}") }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokenize(text) {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSIONS)
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes.iter().fold(OFFSET, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(PRIME))
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
