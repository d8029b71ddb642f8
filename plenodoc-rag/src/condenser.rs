//! History-aware query rewriting.

use std::sync::Arc;
use std::time::Duration;

use plenodoc_model::{ChatModel, ConversationTurn};
use tracing::{debug, error, warn};

use crate::error::{RagError, Result};
use crate::pipeline::complete_with_timeout;
use crate::prompts::CONDENSE_INSTRUCTION;

/// Rewrites a follow-up question into a stand-alone search query.
#[derive(Clone)]
pub struct QueryCondenser {
    model: Arc<dyn ChatModel>,
    timeout: Duration,
}

impl QueryCondenser {
    pub fn new(model: Arc<dyn ChatModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// The search query for `question` in the context of `history`.
    ///
    /// With no history the question is returned unchanged and the model is
    /// not called. A blank rewrite also falls back to the question.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ModelCallFailed`] carrying `question` if the model
    /// call fails or times out.
    pub async fn condense(&self, history: &[ConversationTurn], question: &str) -> Result<String> {
        if history.is_empty() {
            return Ok(question.to_string());
        }

        debug!(turns = history.len(), "condensing question");
        let rewritten = complete_with_timeout(self.model.as_ref(), CONDENSE_INSTRUCTION, history, question, self.timeout)
            .await
            .map_err(|source| {
                error!(error = %source, "condense call failed");
                RagError::ModelCallFailed { question: question.to_string(), source }
            })?;

        let rewritten = rewritten.trim();
        if rewritten.is_empty() {
            warn!("condense call returned nothing, using the question as is");
            return Ok(question.to_string());
        }
        debug!(query = rewritten, "condensed question");
        Ok(rewritten.to_string())
    }
}

#[cfg(test)]
mod tests {
    use plenodoc_model::MockChatModel;

    use super::*;

    fn condenser(model: &MockChatModel) -> QueryCondenser {
        QueryCondenser::new(Arc::new(model.clone()), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn empty_history_returns_question_without_a_call() {
        let model = MockChatModel::new("mock");
        assert_eq!(condenser(&model).condense(&[], "X").await.unwrap(), "X");
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn rewrites_with_history() {
        let model = MockChatModel::new("mock").with_reply("  What color is the sky?\n");
        let history = vec![ConversationTurn::user("Tell me about the sky"), ConversationTurn::assistant("It is above.")];

        let query = condenser(&model).condense(&history, "What color is it?").await.unwrap();
        assert_eq!(query, "What color is the sky?");

        let calls = model.calls();
        assert_eq!(calls[0].system_prompt, CONDENSE_INSTRUCTION);
        assert_eq!(calls[0].history, history);
        assert_eq!(calls[0].user_message, "What color is it?");
    }

    #[tokio::test]
    async fn failure_keeps_the_question() {
        let model = MockChatModel::new("mock").with_failure("down");
        let history = vec![ConversationTurn::user("a"), ConversationTurn::assistant("b")];

        let err = condenser(&model).condense(&history, "and then?").await.unwrap_err();
        assert_eq!(err.question(), Some("and then?"));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn blank_rewrite_falls_back_to_question() {
        let model = MockChatModel::new("mock").with_reply("   ");
        let history = vec![ConversationTurn::user("a"), ConversationTurn::assistant("b")];
        assert_eq!(condenser(&model).condense(&history, "q").await.unwrap(), "q");
    }
}
