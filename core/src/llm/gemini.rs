use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use super::openrouter::{build_http, env_or};
use super::provider::{CompletionProvider, ProviderError};
use crate::Result;

const PROVIDER: &str = "Gemini";

/// Configuration for the fallback generative-content client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiConfig {
    pub base_url: String, // e.g., https://generativelanguage.googleapis.com/v1beta
    pub model: String,    // e.g., gemini-1.5-flash
    pub api_key: String,
    pub request_timeout_ms: Option<u64>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: env_or(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            model: env_or("GEMINI_MODEL", "gemini-1.5-flash"),
            api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
            request_timeout_ms: std::env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok()),
        }
    }
}

/// Fallback provider: `models/{model}:generateContent` with a JSON response MIME type
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    cfg: GeminiConfig,
}

impl GeminiClient {
    pub fn new(cfg: GeminiConfig) -> Result<Self> {
        let http = build_http(cfg.request_timeout_ms)?;
        Ok(Self { http, cfg })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(GeminiConfig::default())
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.cfg
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.cfg.base_url.trim_end_matches('/'),
            self.cfg.model
        )
    }

    fn request_body(prompt: &str) -> Value {
        json!({
            "contents": [{"role": "user", "parts": [{"text": prompt}]}],
            "generationConfig": {"responseMimeType": "application/json"},
        })
    }
}

#[async_trait]
impl CompletionProvider for GeminiClient {
    fn name(&self) -> String {
        PROVIDER.to_string()
    }

    async fn complete(&self, prompt: &str) -> std::result::Result<String, ProviderError> {
        let url = self.url();
        debug!(target: "gemini", model = %self.cfg.model, "POST {} via generateContent", url);

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.cfg.api_key)
            .json(&Self::request_body(prompt))
            .send()
            .await
            .map_err(|e| {
                warn!(target: "gemini", error = %e, "generateContent request failed");
                ProviderError::transport(PROVIDER, &e)
            })?;

        let status = resp.status();
        if !status.is_success() {
            // Google reports failures as {"error": {"message": ...}}
            let detail = resp
                .json::<Value>()
                .await
                .ok()
                .and_then(|v| extract_error_message(&v));
            error!(target: "gemini", %status, "generateContent error");
            return Err(ProviderError::Http {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                detail,
            });
        }

        let val: Value = resp.json().await.map_err(|e| {
            ProviderError::shape(PROVIDER, format!("Failed to parse generateContent JSON: {e}"))
        })?;
        extract_text_from_candidates(&val)
    }
}

fn extract_error_message(v: &Value) -> Option<String> {
    v.get("error")?
        .get("message")?
        .as_str()
        .map(|s| s.to_string())
}

/// Concatenate the text parts of the first candidate
fn extract_text_from_candidates(v: &Value) -> std::result::Result<String, ProviderError> {
    let candidate = match v
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
    {
        Some(c) => c,
        None => {
            let reason = v
                .get("promptFeedback")
                .and_then(|f| f.get("blockReason"))
                .and_then(|r| r.as_str());
            return Err(match reason {
                Some(r) => ProviderError::shape(PROVIDER, format!("prompt was blocked: {r}")),
                None => ProviderError::shape(PROVIDER, "response has no candidates"),
            });
        }
    };

    let text: String = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        let detail = match candidate.get("finishReason").and_then(|r| r.as_str()) {
            Some(r) => format!("candidate has no text (finish reason {r})"),
            None => "candidate has no text".to_string(),
        };
        return Err(ProviderError::shape(PROVIDER, detail));
    }
    Ok(text)
}
