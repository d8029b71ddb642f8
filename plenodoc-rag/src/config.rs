//! Configuration for the knowledge base and the retrieval pipeline.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// What to do when the history-aware rewrite of a question fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CondenseFallback {
    /// Surface the failure as [`RagError::ModelCallFailed`].
    #[default]
    Propagate,
    /// Log a warning and retrieve with the raw question instead.
    UseRawQuestion,
}

/// Configuration parameters for chunking, retrieval and model calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of chunks handed to the answer step.
    pub top_k: usize,
    /// Optional minimum similarity score. `None` keeps every top-k result.
    pub similarity_threshold: Option<f32>,
    /// Deadline for each embedding call.
    pub embedding_timeout: Duration,
    /// Deadline for each chat model call.
    pub model_timeout: Duration,
    /// Behavior when the condense step fails.
    pub condense_fallback: CondenseFallback,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 150,
            top_k: 4,
            similarity_threshold: None,
            embedding_timeout: Duration::from_secs(60),
            model_timeout: Duration::from_secs(120),
            condense_fallback: CondenseFallback::Propagate,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - a timeout is zero
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".to_string()));
        }
        if self.embedding_timeout.is_zero() || self.model_timeout.is_zero() {
            return Err(RagError::Config("timeouts must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of chunks retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Drop retrieved chunks scoring below `threshold`.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = Some(threshold);
        self
    }

    pub fn embedding_timeout(mut self, timeout: Duration) -> Self {
        self.config.embedding_timeout = timeout;
        self
    }

    pub fn model_timeout(mut self, timeout: Duration) -> Self {
        self.config.model_timeout = timeout;
        self
    }

    pub fn condense_fallback(mut self, fallback: CondenseFallback) -> Self {
        self.config.condense_fallback = fallback;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Where the knowledge base lives on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KnowledgeBaseConfig {
    /// Directory holding one file per uploaded document.
    pub documents_dir: PathBuf,
    /// Directory holding the persisted vector index.
    pub index_dir: PathBuf,
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self { documents_dir: PathBuf::from("documents"), index_dir: PathBuf::from("vector_index") }
    }
}

impl KnowledgeBaseConfig {
    /// Both directories under a common root.
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self { documents_dir: root.join("documents"), index_dir: root.join("vector_index") }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RagConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 150);
        assert_eq!(config.condense_fallback, CondenseFallback::Propagate);
    }

    #[test]
    fn builder_rejects_inconsistent_values() {
        assert!(RagConfig::builder().chunk_size(100).chunk_overlap(100).build().is_err());
        assert!(RagConfig::builder().top_k(0).build().is_err());
        assert!(RagConfig::builder().model_timeout(Duration::ZERO).build().is_err());

        let config = RagConfig::builder().chunk_size(200).chunk_overlap(20).top_k(2).build();
        assert!(config.is_ok());
    }

    #[test]
    fn round_trips_through_json() {
        let config = RagConfig::builder()
            .similarity_threshold(0.2)
            .condense_fallback(CondenseFallback::UseRawQuestion)
            .build()
            .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let back: RagConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
