//! The chat completion abstraction shared by every provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Who authored a [`ConversationTurn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A message typed by the end user.
    User,
    /// A message produced by the assistant.
    Assistant,
}

impl Role {
    /// The role name used by OpenAI-compatible chat APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// The author of the message.
    pub role: Role,
    /// The message text.
    pub content: String,
}

impl ConversationTurn {
    /// A turn authored by the user.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    /// A turn authored by the assistant.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// A single-shot, non-streaming chat completion backend.
///
/// The request is always shaped as a system prompt, followed by the prior
/// conversation, followed by the new user message. Implementations return the
/// assistant text of the first choice.
///
/// # Example
///
/// ```rust,ignore
/// use plenodoc_model::{ChatModel, ConversationTurn};
///
/// let history = vec![ConversationTurn::user("hi"), ConversationTurn::assistant("hello")];
/// let reply = model.complete("Be brief.", &history, "What did I just say?").await?;
/// ```
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// The model identifier, e.g. `gpt-4o-mini`.
    fn name(&self) -> &str;

    /// Run one completion.
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ConversationTurn],
        user_message: &str,
    ) -> Result<String>;
}
