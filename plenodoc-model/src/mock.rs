//! Scripted chat model for tests and offline runs.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::chat::{ChatModel, ConversationTurn};
use crate::error::{ModelError, Result};

type Responder = dyn Fn(&RecordedCall) -> Result<String> + Send + Sync;

/// A call observed by [`MockChatModel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub system_prompt: String,
    pub history: Vec<ConversationTurn>,
    pub user_message: String,
}

/// A [`ChatModel`] that answers from a script instead of a network call.
///
/// Replies are taken from a queue first; once the queue is empty the
/// responder closure (if any) is used, and otherwise the user message is
/// echoed back. Every call is recorded and can be inspected with
/// [`calls`](MockChatModel::calls).
///
/// ```rust,ignore
/// let model = MockChatModel::new("mock")
///     .with_reply("first")
///     .with_failure("boom");
/// ```
#[derive(Clone)]
pub struct MockChatModel {
    name: String,
    queue: Arc<Mutex<VecDeque<Result<String>>>>,
    responder: Option<Arc<Responder>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockChatModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            queue: Arc::new(Mutex::new(VecDeque::new())),
            responder: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a successful reply.
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.push(Ok(reply.into()));
        self
    }

    /// Queue a failing reply.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.push(Err(ModelError::Mock(message.into())));
        self
    }

    /// Answer with `responder` once the queue is drained.
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&RecordedCall) -> Result<String> + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new(responder));
        self
    }

    /// All calls received so far, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or_default()
    }

    fn push(&self, reply: Result<String>) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(reply);
        }
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ConversationTurn],
        user_message: &str,
    ) -> Result<String> {
        let call = RecordedCall {
            system_prompt: system_prompt.to_string(),
            history: history.to_vec(),
            user_message: user_message.to_string(),
        };
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call.clone());
        }

        let queued = self.queue.lock().ok().and_then(|mut queue| queue.pop_front());
        match (queued, &self.responder) {
            (Some(reply), _) => reply,
            (None, Some(responder)) => responder(&call),
            (None, None) => Ok(call.user_message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queue_then_responder_then_echo() {
        let model = MockChatModel::new("mock").with_reply("one").with_failure("two");

        assert_eq!(model.complete("sys", &[], "q1").await.unwrap(), "one");
        assert!(matches!(model.complete("sys", &[], "q2").await, Err(ModelError::Mock(_))));
        assert_eq!(model.complete("sys", &[], "q3").await.unwrap(), "q3");

        let model = model.with_responder(|call| Ok(call.system_prompt.to_uppercase()));
        assert_eq!(model.complete("sys", &[], "q4").await.unwrap(), "SYS");
        assert_eq!(model.call_count(), 4);
    }

    #[tokio::test]
    async fn records_history() {
        let model = MockChatModel::new("mock");
        let history = vec![ConversationTurn::user("a"), ConversationTurn::assistant("b")];
        model.complete("sys", &history, "c").await.unwrap();

        let calls = model.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].history, history);
        assert_eq!(calls[0].user_message, "c");
    }
}
