//! Per-session conversational state.

use std::path::PathBuf;
use std::sync::Arc;

use plenodoc_model::ChatModel;
#[cfg(feature = "providers")]
use plenodoc_model::{ModelError, ModelSelection};
use tracing::{debug, info, warn};

use crate::composer::Answer;
use crate::error::{RagError, Result};
use crate::index::IndexHandle;
use crate::knowledge::{IngestReport, KnowledgeBase};
use crate::memory::ConversationMemory;
use crate::pipeline::RagPipeline;
use crate::retriever::Retriever;

/// Everything one user session owns: the conversation, the chain and the
/// retriever binding.
///
/// Only the persisted index is shared between sessions. Mutations made
/// through a session rebind its retriever to the resulting snapshot.
#[derive(Debug)]
pub struct ChatSession {
    knowledge: KnowledgeBase,
    memory: ConversationMemory,
    retriever: Option<Retriever>,
    pipeline: Option<RagPipeline>,
}

impl ChatSession {
    pub fn new(knowledge: KnowledgeBase) -> Self {
        Self { knowledge, memory: ConversationMemory::new(), retriever: None, pipeline: None }
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn retriever(&self) -> Option<&Retriever> {
        self.retriever.as_ref()
    }

    pub fn is_model_ready(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Connect to a catalogued provider and build the chain.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NoCredential`] for a blank key and
    /// [`RagError::RetrieverNotReady`] if there is no index yet.
    #[cfg(feature = "providers")]
    pub async fn connect_model(&mut self, selection: &ModelSelection, api_key: &str) -> Result<()> {
        let provider = selection.provider.display_name().to_string();
        if api_key.trim().is_empty() {
            return Err(RagError::NoCredential { provider });
        }
        let model = plenodoc_model::connect(selection, api_key, Some(self.knowledge.config().model_timeout))
            .map_err(|err| match err {
                ModelError::MissingCredential { .. } => RagError::NoCredential { provider },
                other => RagError::Config(other.to_string()),
            })?;
        self.initialize_model(model).await
    }

    /// Build the chain around `model`.
    ///
    /// The knowledge base must have an index: the chain is not built without
    /// something to retrieve from.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::RetrieverNotReady`] if no index exists or
    /// [`RagError::IndexCorrupt`] if it cannot be loaded.
    pub async fn initialize_model(&mut self, model: Arc<dyn ChatModel>) -> Result<()> {
        if !self.refresh_retriever().await? {
            self.pipeline = None;
            return Err(RagError::RetrieverNotReady);
        }
        let pipeline = RagPipeline::builder().config(self.knowledge.config().clone()).chat_model(model).build()?;
        info!(model = pipeline.model_name(), "chat chain initialized");
        self.pipeline = Some(pipeline);
        Ok(())
    }

    /// Rebind the retriever to the latest persisted index. Returns whether
    /// an index is bound.
    pub async fn refresh_retriever(&mut self) -> Result<bool> {
        match self.knowledge.load_index().await {
            Ok(index) => {
                self.bind(index);
                Ok(self.retriever.is_some())
            }
            Err(err) => {
                self.retriever = None;
                Err(err)
            }
        }
    }

    /// Upload files and rebind to the resulting index.
    pub async fn upload(&mut self, files: &[PathBuf]) -> Result<IngestReport> {
        let report = self.knowledge.upload(files).await?;
        self.bind(report.index.clone());
        Ok(report)
    }

    /// Remove a document and rebind to the rebuilt index.
    pub async fn remove(&mut self, name: &str) -> Result<IngestReport> {
        let report = self.knowledge.remove(name).await?;
        self.bind(report.index.clone());
        Ok(report)
    }

    /// Rebuild the index and rebind to it.
    pub async fn rebuild(&mut self) -> Result<IngestReport> {
        let report = self.knowledge.rebuild().await?;
        self.bind(report.index.clone());
        Ok(report)
    }

    /// Answer `question` and record the exchange.
    ///
    /// The retriever is rebound first if the index changed since it was
    /// bound, including changes made by other sessions. Nothing is recorded
    /// if the question fails; the error carries the question when a model
    /// call was the cause.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::RetrieverNotReady`] (before any model call) when
    /// there is no index, [`RagError::IndexCorrupt`] when it cannot be
    /// loaded, [`RagError::ModelNotReady`] when no chain was built, and
    /// pipeline errors otherwise.
    pub async fn ask(&mut self, question: &str) -> Result<Answer> {
        let current = self.retriever.as_ref().is_some_and(|retriever| {
            self.knowledge.store().is_current(retriever.index())
        });
        if !current {
            debug!("retriever missing or outdated, reloading index");
            if let Err(err) = self.refresh_retriever().await {
                warn!(error = %err, "could not load index");
                return Err(err);
            }
        }
        let retriever = self.retriever.as_ref().ok_or(RagError::RetrieverNotReady)?;
        let pipeline = self.pipeline.as_ref().ok_or(RagError::ModelNotReady)?;

        let answer = pipeline.ask(retriever, self.memory.history(), question).await?;
        self.memory.record(question, answer.text.clone());
        Ok(answer)
    }

    /// Forget the conversation but keep the chain.
    pub fn clear_history(&mut self) {
        self.memory.clear();
    }

    /// End the session: clear the conversation and drop the chain and the
    /// retriever binding.
    pub fn logout(&mut self) {
        self.memory.clear();
        self.pipeline = None;
        self.retriever = None;
        info!("session ended");
    }

    fn bind(&mut self, index: Option<IndexHandle>) {
        self.retriever = index.map(|index| self.knowledge.bind(index));
    }
}
