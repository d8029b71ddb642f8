//! Error types for the `plenodoc-rag` crate.

use std::path::PathBuf;

use plenodoc_model::ModelError;
use thiserror::Error;

/// Errors that can occur while building or querying the knowledge base.
#[derive(Debug, Error)]
pub enum RagError {
    /// The loader has no parser for the file's extension. Non-fatal: the file
    /// is skipped and reported.
    #[error("Unsupported format: {}", path.display())]
    UnsupportedFormat {
        /// The skipped file.
        path: PathBuf,
    },

    /// A parser failed on a specific file. Non-fatal: the file is skipped and
    /// reported.
    #[error("Failed to load {}: {message}", path.display())]
    LoadFailed {
        /// The file that could not be parsed.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// Embedding generation failed. Aborts the current index operation
    /// before anything is written.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingFailed {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The persisted index exists but cannot be read back. Treat the index as
    /// absent and offer a rebuild.
    #[error("Index at {} is corrupt: {message}", path.display())]
    IndexCorrupt {
        /// The index file that failed to load.
        path: PathBuf,
        /// A description of what was wrong.
        message: String,
    },

    /// A condense or answer call to the chat model failed. The original
    /// question is kept so that the caller can retry it.
    #[error("Model call failed for question '{question}': {source}")]
    ModelCallFailed {
        /// The question the user asked.
        question: String,
        /// The underlying model failure.
        #[source]
        source: ModelError,
    },

    /// A question was asked before any index exists.
    #[error("The knowledge base is not ready: upload documents to build it first")]
    RetrieverNotReady,

    /// A question was asked before a chat model was initialized.
    #[error("No chat model initialized: select a provider and model first")]
    ModelNotReady,

    /// Model initialization was attempted without an API key.
    #[error("An API key is required for {provider}")]
    NoCredential {
        /// The provider that was being initialized.
        provider: String,
    },

    /// A document file name is not a plain file name.
    #[error("Invalid document name '{0}'")]
    InvalidFileName(String),

    /// An I/O failure on the document set or the index directory.
    #[error("Storage error at {}: {message}", path.display())]
    Storage {
        /// The path involved.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RagError {
    /// Whether the caller can retry or degrade instead of giving up.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RagError::ModelCallFailed { .. }
                | RagError::UnsupportedFormat { .. }
                | RagError::LoadFailed { .. }
                | RagError::IndexCorrupt { .. }
        )
    }

    /// The user's question, if this error carries one.
    pub fn question(&self) -> Option<&str> {
        match self {
            RagError::ModelCallFailed { question, .. } => Some(question),
            _ => None,
        }
    }

    pub(crate) fn storage(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        RagError::Storage { path: path.into(), message: err.to_string() }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
