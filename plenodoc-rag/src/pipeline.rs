//! Conversational RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] runs one question through the history-aware chain:
//! condense the question against the conversation, retrieve the closest
//! chunks for the condensed query, then compose a grounded answer.
//!
//! # Example
//!
//! ```rust,ignore
//! use plenodoc_rag::{RagPipeline, RagConfig, Retriever};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .chat_model(model)
//!     .build()?;
//!
//! let answer = pipeline.ask(&retriever, memory.history(), "What color is the sky?").await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use plenodoc_model::{ChatModel, ConversationTurn, ModelError};
use tracing::{info, warn};

use crate::composer::{Answer, AnswerComposer};
use crate::condenser::QueryCondenser;
use crate::config::{CondenseFallback, RagConfig};
use crate::error::{RagError, Result};
use crate::retriever::Retriever;

/// Run one chat completion under a deadline.
pub(crate) async fn complete_with_timeout(
    model: &dyn ChatModel,
    system_prompt: &str,
    history: &[ConversationTurn],
    user_message: &str,
    timeout: Duration,
) -> std::result::Result<String, ModelError> {
    match tokio::time::timeout(timeout, model.complete(system_prompt, history, user_message)).await {
        Ok(result) => result,
        Err(_) => Err(ModelError::Timeout { provider: model.name().to_string(), seconds: timeout.as_secs() }),
    }
}

/// The condense → retrieve → answer chain for one chat model.
///
/// The pipeline holds no index: the [`Retriever`] is passed to each call so
/// that a session can rebind it after the index changes without rebuilding
/// the chain. Construct one via [`RagPipeline::builder()`].
#[derive(Clone)]
pub struct RagPipeline {
    config: RagConfig,
    model_name: String,
    condenser: QueryCondenser,
    composer: AnswerComposer,
}

impl std::fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagPipeline").field("config", &self.config).field("model", &self.model_name).finish()
    }
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Name of the chat model behind the chain.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Answer `question` using `retriever` for grounding.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ModelCallFailed`] with the original question if
    /// either model call fails (the condense failure only when the fallback
    /// policy is [`CondenseFallback::Propagate`]), or
    /// [`RagError::EmbeddingFailed`] if the query cannot be embedded.
    pub async fn ask(&self, retriever: &Retriever, history: &[ConversationTurn], question: &str) -> Result<Answer> {
        let query = match self.condenser.condense(history, question).await {
            Ok(query) => query,
            Err(err @ RagError::ModelCallFailed { .. })
                if self.config.condense_fallback == CondenseFallback::UseRawQuestion =>
            {
                warn!(error = %err, "condense failed, retrieving with the raw question");
                question.to_string()
            }
            Err(err) => return Err(err),
        };

        let retrieved = retriever.retrieve(&query, self.config.top_k).await?;
        let answer = self.composer.answer(history, question, retrieved).await?;

        info!(sources = answer.sources.len(), condensed = query != question, "answered question");
        Ok(answer)
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// The chat model is required; the configuration defaults to
/// [`RagConfig::default()`].
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    chat_model: Option<Arc<dyn ChatModel>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the chat model used for both the condense and the answer step.
    pub fn chat_model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.chat_model = Some(model);
        self
    }

    /// Build the [`RagPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ModelNotReady`] if no chat model was set, or
    /// [`RagError::Config`] if the configuration is invalid.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let model = self.chat_model.ok_or(RagError::ModelNotReady)?;

        Ok(RagPipeline {
            model_name: model.name().to_string(),
            condenser: QueryCondenser::new(model.clone(), config.model_timeout),
            composer: AnswerComposer::new(model, config.model_timeout),
            config,
        })
    }
}
