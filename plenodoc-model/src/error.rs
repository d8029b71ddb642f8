//! Error types for the `plenodoc-model` crate.

use thiserror::Error;

/// Errors that can occur while talking to a chat model.
///
/// Each failure mode is a separate variant so that callers can tell an
/// invalid credential apart from a rate limit or a network failure.
#[derive(Debug, Error)]
pub enum ModelError {
    /// No credential was supplied for a provider that requires one.
    #[error("No API key provided for {provider}")]
    MissingCredential {
        /// The provider that was being configured.
        provider: String,
    },

    /// The provider rejected the credential (HTTP 401 / 403).
    #[error("{provider} rejected the API key: {message}")]
    Unauthorized {
        /// The provider that produced the error.
        provider: String,
        /// The message returned by the provider.
        message: String,
    },

    /// The provider throttled the request (HTTP 429).
    #[error("{provider} rate limit reached: {message}")]
    RateLimited {
        /// The provider that produced the error.
        provider: String,
        /// The message returned by the provider.
        message: String,
    },

    /// Any other non-success HTTP status.
    #[error("{provider} API returned {status}: {message}")]
    Api {
        /// The provider that produced the error.
        provider: String,
        /// The HTTP status code.
        status: u16,
        /// The message returned by the provider.
        message: String,
    },

    /// The request could not be delivered (DNS, TLS, connection reset, ...).
    #[error("{provider} request failed: {message}")]
    Request {
        /// The provider that produced the error.
        provider: String,
        /// A description of the transport failure.
        message: String,
    },

    /// The call did not complete within the configured deadline.
    #[error("{provider} call timed out after {seconds}s")]
    Timeout {
        /// The provider that produced the error.
        provider: String,
        /// The deadline that expired, in seconds.
        seconds: u64,
    },

    /// The provider answered with a body that could not be understood.
    #[error("{provider} returned an invalid response: {message}")]
    InvalidResponse {
        /// The provider that produced the error.
        provider: String,
        /// A description of what was wrong with the body.
        message: String,
    },

    /// A scripted failure from [`MockChatModel`](crate::MockChatModel).
    #[error("mock model failure: {0}")]
    Mock(String),
}

impl ModelError {
    /// Whether retrying the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ModelError::RateLimited { .. } | ModelError::Request { .. } | ModelError::Timeout { .. }
        ) || matches!(self, ModelError::Api { status, .. } if *status >= 500)
    }
}

/// A convenience result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
