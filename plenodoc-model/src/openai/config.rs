//! Configuration for OpenAI-compatible chat clients.

use std::time::Duration;

use crate::provider::{ModelSelection, Provider};

/// Sampling temperature used for every request unless overridden.
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Deadline for a single completion unless overridden.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Connection settings for an [`OpenAICompatibleClient`](super::OpenAICompatibleClient).
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Label used in logs and errors.
    pub provider_name: String,
    /// API key sent as a bearer token.
    pub api_key: String,
    /// Base URL, without the trailing `/chat/completions`.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Per-request deadline.
    pub timeout: Duration,
}

impl OpenAIConfig {
    /// Settings for a catalogued provider/model pair.
    pub fn for_selection(selection: &ModelSelection, api_key: impl Into<String>) -> Self {
        Self::compatible(api_key, selection.provider.base_url(), selection.model.clone())
            .with_provider_name(provider_label(selection.provider))
    }

    /// Settings for an arbitrary OpenAI-compatible endpoint.
    pub fn compatible(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            provider_name: "OpenAI-compatible".to_string(),
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the provider label.
    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = name.into();
        self
    }

    /// Override the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Override the request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

fn provider_label(provider: Provider) -> &'static str {
    match provider {
        Provider::Groq => "Groq",
        Provider::OpenAI => "OpenAI",
    }
}
