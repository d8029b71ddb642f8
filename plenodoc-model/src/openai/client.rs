//! OpenAI-compatible chat-completions client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::config::OpenAIConfig;
use crate::chat::{ChatModel, ConversationTurn};
use crate::error::{ModelError, Result};

/// Chat client for OpenAI and OpenAI-compatible APIs (Groq, vLLM, Ollama, ...).
///
/// Uses `reqwest` to call `{base_url}/chat/completions` directly with a single,
/// non-streaming request.
///
/// # Example
///
/// ```rust,ignore
/// use plenodoc_model::openai::{OpenAICompatibleClient, OpenAIConfig};
///
/// let client = OpenAICompatibleClient::new(OpenAIConfig::compatible(
///     std::env::var("OPENAI_API_KEY")?,
///     "https://api.openai.com/v1",
///     "gpt-4o-mini",
/// ))?;
/// ```
pub struct OpenAICompatibleClient {
    client: reqwest::Client,
    config: OpenAIConfig,
}

impl OpenAICompatibleClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MissingCredential`] if the API key is blank.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ModelError::MissingCredential { provider: config.provider_name.clone() });
        }
        let client = reqwest::Client::builder().timeout(config.timeout).build().map_err(|e| {
            ModelError::Request {
                provider: config.provider_name.clone(),
                message: format!("failed to build HTTP client: {e}"),
            }
        })?;
        Ok(Self { client, config })
    }

    /// The configuration this client was built from.
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    fn provider(&self) -> String {
        self.config.provider_name.clone()
    }

    fn map_status(&self, status: reqwest::StatusCode, body: String) -> ModelError {
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        let provider = self.provider();
        match status.as_u16() {
            401 | 403 => ModelError::Unauthorized { provider, message },
            429 => ModelError::RateLimited { provider, message },
            code => ModelError::Api { provider, status: code, message },
        }
    }
}

// ── Chat completions request/response types ────────────────────────

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── ChatModel implementation ───────────────────────────────────────

#[async_trait]
impl ChatModel for OpenAICompatibleClient {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ConversationTurn],
        user_message: &str,
    ) -> Result<String> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message { role: "system", content: system_prompt });
        messages.extend(
            history.iter().map(|turn| Message { role: turn.role.as_str(), content: &turn.content }),
        );
        messages.push(Message { role: "user", content: user_message });

        debug!(
            provider = %self.config.provider_name,
            model = %self.config.model,
            message_count = messages.len(),
            "sending chat completion"
        );

        let request_body = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            stream: false,
        };

        let response = self
            .client
            .post(self.config.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = %self.config.provider_name, error = %e, "request failed");
                if e.is_timeout() {
                    ModelError::Timeout {
                        provider: self.provider(),
                        seconds: self.config.timeout.as_secs(),
                    }
                } else {
                    ModelError::Request { provider: self.provider(), message: e.to_string() }
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(provider = %self.config.provider_name, %status, "API error");
            return Err(self.map_status(status, body));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            error!(provider = %self.config.provider_name, error = %e, "failed to parse response");
            ModelError::InvalidResponse {
                provider: self.provider(),
                message: format!("failed to parse response: {e}"),
            }
        })?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ModelError::InvalidResponse {
                provider: self.provider(),
                message: "response contained no message content".into(),
            })
    }
}
