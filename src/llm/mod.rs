//! Language model access.
//!
//! The reasoning loop treats the model as a text-in/text-out oracle: the
//! composed prompt already embeds the grammar the completion must follow.

mod gemini;
#[cfg(test)]
mod scripted;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use gemini::{Backoff, GeminiClient};
#[cfg(test)]
pub use scripted::ScriptedLlm;

/// Errors raised by a model client. All of them are terminal for a query.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Provider {provider} rate limited the request")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    /// `status` is set when the provider answered with an HTTP error.
    #[error("Request to {provider} failed: {reason}")]
    RequestFailed {
        provider: String,
        status: Option<u16>,
        reason: String,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),
}

impl LlmError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::RequestFailed { status, .. } => matches!(status, Some(code) if *code >= 500),
            _ => false,
        }
    }
}

/// A text completion oracle.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete `prompt` and return the raw completion text.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// Model identifier, for logs and health output.
    fn model_name(&self) -> &str;
}
