//! Generative-text providers behind the insight endpoint.
//!
//! Handlers only see [`InsightProvider`], so the Gemini backend can be
//! swapped for the mock in tests.

pub mod gemini;
pub mod mock;

use async_trait::async_trait;
use service_core::retry::Retryable;
use thiserror::Error;

pub use gemini::{GeminiConfig, GeminiInsightProvider};
pub use mock::MockInsightProvider;

/// Error type for provider operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider request timed out")]
    Timeout,

    #[error("Provider returned no text")]
    EmptyResponse,

    #[error("Content filtered")]
    ContentFiltered,
}

impl Retryable for ProviderError {
    fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Network(_) | ProviderError::Timeout | ProviderError::RateLimited => {
                true
            }
            ProviderError::Api { status, .. } => *status >= 500,
            ProviderError::NotConfigured(_)
            | ProviderError::EmptyResponse
            | ProviderError::ContentFiltered => false,
        }
    }
}

/// A backend that turns a free-text prompt into generated text.
#[async_trait]
pub trait InsightProvider: Send + Sync {
    /// Generate text for `prompt`. `request_id` correlates the outbound
    /// call with the inbound request.
    async fn generate(
        &self,
        prompt: &str,
        request_id: Option<&str>,
    ) -> Result<String, ProviderError>;

    /// Whether the provider holds the credentials it needs.
    fn is_configured(&self) -> bool;
}
