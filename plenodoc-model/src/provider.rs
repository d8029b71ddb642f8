//! The catalogue of supported chat providers.
//!
//! Providers are a closed enum rather than a string-keyed table: each variant
//! knows its endpoint, the models offered for it and the environment variable
//! that conventionally carries its API key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A hosted chat-completion provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Groq's OpenAI-compatible endpoint (rate limited free tier).
    Groq,
    /// OpenAI.
    OpenAI,
}

impl Provider {
    /// Every provider, in display order.
    pub const ALL: [Provider; 2] = [Provider::Groq, Provider::OpenAI];

    /// Human readable label.
    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Groq => "Groq (Limited)",
            Provider::OpenAI => "OpenAI (Premium)",
        }
    }

    /// Base URL of the OpenAI-compatible API.
    pub fn base_url(&self) -> &'static str {
        match self {
            Provider::Groq => "https://api.groq.com/openai/v1",
            Provider::OpenAI => "https://api.openai.com/v1",
        }
    }

    /// Models offered for this provider. The first entry is the default.
    pub fn models(&self) -> &'static [&'static str] {
        match self {
            Provider::Groq => &["openai/gpt-oss-120b"],
            Provider::OpenAI => &["gpt-4o-mini"],
        }
    }

    /// The default model for this provider.
    pub fn default_model(&self) -> &'static str {
        self.models()[0]
    }

    /// Environment variable holding the API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::Groq => "GROQ_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
        }
    }

    /// Short identifier, as accepted by [`FromStr`].
    pub fn id(&self) -> &'static str {
        match self {
            Provider::Groq => "groq",
            Provider::OpenAI => "openai",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(Provider::Groq),
            "openai" => Ok(Provider::OpenAI),
            other => Err(format!("unknown provider '{other}' (expected 'groq' or 'openai')")),
        }
    }
}

/// A provider/model pair picked by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSelection {
    /// The provider serving the model.
    pub provider: Provider,
    /// The model identifier.
    pub model: String,
}

impl ModelSelection {
    /// Select `model` from `provider`, rejecting models outside the catalogue.
    pub fn new(provider: Provider, model: impl Into<String>) -> Result<Self, String> {
        let model = model.into();
        if !provider.models().contains(&model.as_str()) {
            return Err(format!(
                "model '{model}' is not offered by {} (available: {})",
                provider.display_name(),
                provider.models().join(", ")
            ));
        }
        Ok(Self { provider, model })
    }

    /// Select the provider's default model.
    pub fn default_for(provider: Provider) -> Self {
        Self { provider, model: provider.default_model().to_string() }
    }
}
