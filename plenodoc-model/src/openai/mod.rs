//! OpenAI-compatible provider implementation.
//!
//! Groq and OpenAI both expose the same chat-completions protocol, so one
//! client serves every entry of the [`Provider`](crate::Provider) catalogue.

mod client;
mod config;

pub use client::OpenAICompatibleClient;
pub use config::{DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT, OpenAIConfig};
