use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a single provider call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Provider answered with a non-2xx status. `detail` holds the
    /// provider's own error message when it reports one.
    #[error("{provider} API request failed with status {status}{}", detail_suffix(.detail))]
    Http {
        provider: String,
        status: u16,
        detail: Option<String>,
    },

    /// 2xx response whose body did not carry the expected text
    #[error("Invalid response structure from {provider}: {detail}")]
    Shape { provider: String, detail: String },

    /// Request never produced a response (connect, TLS, timeout, ...)
    #[error("{provider} request failed: {detail}")]
    Transport { provider: String, detail: String },
}

impl ProviderError {
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Http { .. } => "http",
            ProviderError::Shape { .. } => "shape",
            ProviderError::Transport { .. } => "transport",
        }
    }

    pub fn provider(&self) -> &str {
        match self {
            ProviderError::Http { provider, .. }
            | ProviderError::Shape { provider, .. }
            | ProviderError::Transport { provider, .. } => provider,
        }
    }

    pub(crate) fn shape(provider: &str, detail: impl Into<String>) -> Self {
        ProviderError::Shape {
            provider: provider.to_string(),
            detail: detail.into(),
        }
    }

    pub(crate) fn transport(provider: &str, err: &reqwest::Error) -> Self {
        ProviderError::Transport {
            provider: provider.to_string(),
            detail: err.to_string(),
        }
    }
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(d) if !d.is_empty() => format!(": {}", d),
        _ => String::new(),
    }
}

/// Raw text returned by whichever provider answered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderReply {
    pub text: String,
    pub provider: String,
}

/// A text-generation backend that takes one prompt and answers with raw text
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Short provider name used in logs and errors (e.g. "OpenRouter")
    fn name(&self) -> String;

    /// Send the prompt and return the provider's text answer
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}
