//! # plenodoc-rag
//!
//! Document-grounded question answering for PlenoDoc.
//!
//! ## Overview
//!
//! Uploaded files flow through the [`FileLoader`] and the
//! [`RecursiveChunker`] into a persisted [`VectorIndex`] managed by an
//! [`IndexStore`]. A [`ChatSession`] answers questions with the
//! history-aware [`RagPipeline`]: the [`QueryCondenser`] rewrites the
//! question into a stand-alone query, the [`Retriever`] finds the closest
//! chunks, and the [`AnswerComposer`] asks the chat model for a grounded
//! answer.
//!
//! - [`KnowledgeBase`] - document set plus index, with the incremental vs full rebuild policy
//! - [`IndexStore`] - atomic persistence and per-directory locking
//! - [`HashingEmbedder`] - local deterministic embeddings
//! - [`openai::OpenAIEmbeddingProvider`] - hosted embeddings (feature `openai`)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use plenodoc_rag::{ChatSession, HashingEmbedder, KnowledgeBase, KnowledgeBaseConfig, RagConfig};
//!
//! let kb = KnowledgeBase::open(
//!     &KnowledgeBaseConfig::default(),
//!     RagConfig::default(),
//!     Arc::new(HashingEmbedder::default()),
//! )?;
//! let mut session = ChatSession::new(kb);
//! session.upload(&["notes.txt".into()]).await?;
//! session.initialize_model(model).await?;
//! let answer = session.ask("What do my notes say about the sky?").await?;
//! ```

pub mod chunking;
pub mod composer;
pub mod condenser;
pub mod config;
pub mod docset;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index;
pub mod knowledge;
pub mod loader;
pub mod memory;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pipeline;
pub mod prompts;
pub mod retriever;
pub mod session;
pub mod store;

pub use chunking::{Chunker, RecursiveChunker, split};
pub use composer::{Answer, AnswerComposer};
pub use condenser::QueryCondenser;
pub use config::{CondenseFallback, KnowledgeBaseConfig, RagConfig, RagConfigBuilder};
pub use docset::{DocumentSet, validate_file_name};
pub use document::{Chunk, Document, SearchResult};
pub use embedding::{EmbeddingProvider, HashingEmbedder};
pub use error::{RagError, Result};
pub use index::{IndexEntry, IndexHandle, VectorIndex, cosine_similarity};
pub use knowledge::{IndexSummary, IngestMode, IngestReport, KnowledgeBase, KnowledgeBaseStatus};
pub use loader::{FileLoader, LoadReport};
pub use memory::ConversationMemory;
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use retriever::Retriever;
pub use session::ChatSession;
pub use store::{INDEX_FILE_NAME, IndexStore, IndexWriter};
