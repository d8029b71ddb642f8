//! Grounded answer generation.

use std::sync::Arc;
use std::time::Duration;

use plenodoc_model::{ChatModel, ConversationTurn};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::document::Chunk;
use crate::error::{RagError, Result};
use crate::pipeline::complete_with_timeout;
use crate::prompts::answer_system_prompt;

/// A model answer with the passages it was grounded on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<Chunk>,
}

/// Builds the answer prompt and runs one completion.
#[derive(Clone)]
pub struct AnswerComposer {
    model: Arc<dyn ChatModel>,
    timeout: Duration,
}

impl AnswerComposer {
    pub fn new(model: Arc<dyn ChatModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// Answer `question` from `retrieved` passages and the conversation so far.
    ///
    /// The system prompt is the persona followed by the passages in a
    /// `[CONTEXT]` block; `history` and `question` follow as chat messages.
    /// Relevance is left to the model: there is no score cutoff here.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ModelCallFailed`] carrying `question` if the model
    /// call fails or times out.
    pub async fn answer(
        &self,
        history: &[ConversationTurn],
        question: &str,
        retrieved: Vec<Chunk>,
    ) -> Result<Answer> {
        let passages: Vec<&str> = retrieved.iter().map(|chunk| chunk.text.as_str()).collect();
        let system_prompt = answer_system_prompt(&passages);
        debug!(
            passages = passages.len(),
            prompt_chars = system_prompt.chars().count(),
            turns = history.len(),
            "composing answer"
        );

        let text = complete_with_timeout(self.model.as_ref(), &system_prompt, history, question, self.timeout)
            .await
            .map_err(|source| {
                error!(error = %source, "answer call failed");
                RagError::ModelCallFailed { question: question.to_string(), source }
            })?;

        Ok(Answer { text, sources: retrieved })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use plenodoc_model::MockChatModel;

    use super::*;

    fn chunk(text: &str) -> Chunk {
        Chunk {
            id: format!("doc.txt_{}", text.len()),
            text: text.to_string(),
            document_id: "doc.txt".to_string(),
            source: "doc.txt".to_string(),
            start_offset: 0,
            end_offset: text.chars().count(),
            metadata: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn single_call_with_context_and_history() {
        let model = MockChatModel::new("mock").with_reply("Blue.");
        let composer = AnswerComposer::new(Arc::new(model.clone()), Duration::from_secs(5));
        let history = vec![ConversationTurn::user("hi"), ConversationTurn::assistant("hello")];

        let answer = composer
            .answer(&history, "What color is the sky?", vec![chunk("The sky is blue."), chunk("Grass is green.")])
            .await
            .unwrap();

        assert_eq!(answer.text, "Blue.");
        assert_eq!(answer.sources.len(), 2);

        let calls = model.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].system_prompt.contains("[CONTEXT]\nThe sky is blue.\n\nGrass is green.\n[/CONTEXT]"));
        assert_eq!(calls[0].history, history);
        assert_eq!(calls[0].user_message, "What color is the sky?");
    }

    #[tokio::test]
    async fn failure_keeps_the_question() {
        let model = MockChatModel::new("mock").with_failure("rate limited");
        let composer = AnswerComposer::new(Arc::new(model), Duration::from_secs(5));

        let err = composer.answer(&[], "why?", Vec::new()).await.unwrap_err();
        assert!(matches!(err, RagError::ModelCallFailed { ref question, .. } if question == "why?"));
    }
}
