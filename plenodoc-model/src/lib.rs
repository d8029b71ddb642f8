//! # plenodoc-model
//!
//! Chat model integrations for PlenoDoc.
//!
//! ## Overview
//!
//! This crate provides the [`ChatModel`] abstraction consumed by the
//! retrieval pipeline, plus:
//!
//! - [`Provider`] / [`ModelSelection`] - the closed catalogue of providers and models
//! - [`openai::OpenAICompatibleClient`] - Groq, OpenAI and other OpenAI-compatible APIs
//! - [`MockChatModel`] - scripted model for tests
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use plenodoc_model::{ModelSelection, Provider, connect};
//!
//! let selection = ModelSelection::default_for(Provider::Groq);
//! let model = connect(&selection, std::env::var("GROQ_API_KEY")?, None)?;
//! let reply = model.complete("You are helpful.", &[], "Hello!").await?;
//! ```
//!
//! ## Supported Models
//!
//! | Provider | Model |
//! |----------|-------|
//! | Groq | `openai/gpt-oss-120b` |
//! | OpenAI | `gpt-4o-mini` |

mod chat;
mod error;
pub mod mock;
#[cfg(feature = "openai")]
pub mod openai;
mod provider;

pub use chat::{ChatModel, ConversationTurn, Role};
pub use error::{ModelError, Result};
pub use mock::MockChatModel;
pub use provider::{ModelSelection, Provider};

#[cfg(feature = "openai")]
use std::sync::Arc;
#[cfg(feature = "openai")]
use std::time::Duration;

/// Build a chat model for a catalogued provider/model pair.
///
/// # Errors
///
/// Returns [`ModelError::MissingCredential`] if `api_key` is blank.
#[cfg(feature = "openai")]
pub fn connect(
    selection: &ModelSelection,
    api_key: impl Into<String>,
    timeout: Option<Duration>,
) -> Result<Arc<dyn ChatModel>> {
    let api_key: String = api_key.into();
    let mut config = openai::OpenAIConfig::for_selection(selection, api_key.trim());
    if let Some(timeout) = timeout {
        config = config.with_timeout(timeout);
    }
    let client = openai::OpenAICompatibleClient::new(config)?;
    tracing::info!(provider = %selection.provider, model = %selection.model, "chat model initialized");
    Ok(Arc::new(client))
}
