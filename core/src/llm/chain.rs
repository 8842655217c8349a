use std::sync::Arc;
use tracing::{info, warn};

use super::gemini::GeminiClient;
use super::openrouter::OpenRouterClient;
use super::provider::{CompletionProvider, ProviderReply};
use crate::config::AssessmentConfig;
use crate::{IntakeError, Result};

/// Primary provider first, fallback provider on any primary failure.
///
/// There is no retry here; a failed chain surfaces as
/// `IntakeError::ProvidersFailed`, which keeps both failures but displays
/// only the fallback's message.
#[derive(Clone)]
pub struct ProviderChain {
    primary: Arc<dyn CompletionProvider>,
    fallback: Arc<dyn CompletionProvider>,
}

impl ProviderChain {
    pub fn new(primary: Arc<dyn CompletionProvider>, fallback: Arc<dyn CompletionProvider>) -> Self {
        Self { primary, fallback }
    }

    /// OpenRouter as primary and Gemini as fallback
    pub fn from_config(cfg: &AssessmentConfig) -> Result<Self> {
        let primary = OpenRouterClient::new(cfg.openrouter.clone())?;
        let fallback = GeminiClient::new(cfg.gemini.clone())?;
        Ok(Self::new(Arc::new(primary), Arc::new(fallback)))
    }

    pub async fn generate(&self, prompt: &str) -> Result<ProviderReply> {
        let primary_name = self.primary.name();
        let primary_err = match self.primary.complete(prompt).await {
            Ok(text) => {
                info!(target: "provider_chain", provider = %primary_name, "Received response from primary provider");
                return Ok(ProviderReply {
                    text,
                    provider: primary_name,
                });
            }
            Err(e) => e,
        };

        let fallback_name = self.fallback.name();
        warn!(
            target: "provider_chain",
            provider = %primary_name,
            kind = primary_err.kind(),
            error = %primary_err,
            fallback = %fallback_name,
            "Primary provider failed; falling back"
        );

        match self.fallback.complete(prompt).await {
            Ok(text) => {
                info!(target: "provider_chain", provider = %fallback_name, "Received response from fallback provider");
                Ok(ProviderReply {
                    text,
                    provider: fallback_name,
                })
            }
            Err(fallback_err) => {
                warn!(
                    target: "provider_chain",
                    provider = %fallback_name,
                    kind = fallback_err.kind(),
                    error = %fallback_err,
                    "Fallback provider failed"
                );
                Err(IntakeError::ProvidersFailed {
                    primary: primary_err,
                    fallback: fallback_err,
                })
            }
        }
    }
}
