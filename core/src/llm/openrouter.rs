use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, warn};

use super::provider::{CompletionProvider, ProviderError};
use crate::prompt::SYSTEM_ROLE;
use crate::{IntakeError, Result};

const PROVIDER: &str = "OpenRouter";

/// Configuration for the primary chat-completion client loaded from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRouterConfig {
    pub endpoint: String, // e.g., https://openrouter.ai/api/v1/chat/completions
    pub model: String,    // e.g., google/gemini-flash
    pub api_key: String,
    /// Attribution headers sent as `HTTP-Referer` and `X-Title`
    pub http_referer: String,
    pub x_title: String,
    pub request_timeout_ms: Option<u64>,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            endpoint: env_or(
                "OPENROUTER_ENDPOINT",
                "https://openrouter.ai/api/v1/chat/completions",
            ),
            model: env_or("OPENROUTER_MODEL", "google/gemini-flash"),
            api_key: std::env::var("OPENROUTER_API_KEY").unwrap_or_default(),
            http_referer: env_or(
                "OPENROUTER_HTTP_REFERER",
                "https://medical-learner.vercel.app",
            ),
            x_title: env_or("OPENROUTER_X_TITLE", "Medical Learner AI"),
            request_timeout_ms: std::env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok()),
        }
    }
}

pub(crate) fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

pub(crate) fn build_http(request_timeout_ms: Option<u64>) -> Result<Client> {
    let mut builder = Client::builder();
    if let Some(ms) = request_timeout_ms {
        builder = builder.timeout(Duration::from_millis(ms));
    }
    builder
        .build()
        .map_err(|e| IntakeError::Client(format!("Failed to build HTTP client: {e}")))
}

/// Primary provider: OpenAI-compatible chat completions with JSON-object output
#[derive(Clone)]
pub struct OpenRouterClient {
    http: Client,
    cfg: OpenRouterConfig,
}

impl OpenRouterClient {
    pub fn new(cfg: OpenRouterConfig) -> Result<Self> {
        let http = build_http(cfg.request_timeout_ms)?;
        Ok(Self { http, cfg })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(OpenRouterConfig::default())
    }

    pub fn config(&self) -> &OpenRouterConfig {
        &self.cfg
    }

    fn request_body(&self, prompt: &str) -> Value {
        json!({
            "model": self.cfg.model,
            "messages": [
                {"role": "system", "content": SYSTEM_ROLE},
                {"role": "user", "content": prompt},
            ],
            "response_format": {"type": "json_object"},
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenRouterClient {
    fn name(&self) -> String {
        PROVIDER.to_string()
    }

    /// Contract:
    /// - Output: the non-empty `choices[0].message.content` string
    /// - Error: `Http` on non-2xx (body is not read), `Shape` on an unexpected
    ///   body, `Transport` when no response arrived
    async fn complete(&self, prompt: &str) -> std::result::Result<String, ProviderError> {
        debug!(
            target: "openrouter",
            model = %self.cfg.model,
            "POST {} via Chat Completions", self.cfg.endpoint
        );

        let resp = self
            .http
            .post(&self.cfg.endpoint)
            .bearer_auth(&self.cfg.api_key)
            .header("HTTP-Referer", &self.cfg.http_referer)
            .header("X-Title", &self.cfg.x_title)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| {
                warn!(target: "openrouter", error = %e, "Chat Completions request failed");
                ProviderError::transport(PROVIDER, &e)
            })?;

        let status = resp.status();
        if !status.is_success() {
            // The body may echo request content; only the status is kept
            error!(target: "openrouter", %status, "Chat Completions error");
            return Err(ProviderError::Http {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                detail: None,
            });
        }

        let val: Value = resp.json().await.map_err(|e| {
            ProviderError::shape(PROVIDER, format!("Failed to parse Chat Completions JSON: {e}"))
        })?;
        extract_text_from_chat_completions(&val)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::shape(PROVIDER, "missing choices[0].message.content")
            })
    }
}

fn extract_text_from_chat_completions(v: &Value) -> Option<String> {
    v.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(|s| s.to_string())
}
