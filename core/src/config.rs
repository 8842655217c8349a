use std::fs;
use std::path::Path;

use crate::llm::{GeminiConfig, OpenRouterConfig};
use crate::prompt::PromptOptions;
use crate::{IntakeError, Result};

/// Retry settings for the assessment pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    /// Fixed pause between failed attempts
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: std::env::var("ASSESS_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(3),
            delay_ms: std::env::var("ASSESS_RETRY_DELAY_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(2_000),
        }
    }
}

/// Everything the assessment core needs: both providers, retry and prompt settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentConfig {
    pub openrouter: OpenRouterConfig,
    pub gemini: GeminiConfig,
    pub retry: RetryConfig,
    pub prompt: PromptOptions,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        // Each section reads its own env vars
        let mut prompt = PromptOptions::default();
        if let Some(lang) = std::env::var("ASSESS_RESPONSE_LANGUAGE")
            .ok()
            .filter(|s| !s.trim().is_empty())
        {
            prompt.response_language = lang;
        }
        Self {
            openrouter: OpenRouterConfig::default(),
            gemini: GeminiConfig::default(),
            retry: RetryConfig::default(),
            prompt,
        }
    }
}

impl AssessmentConfig {
    /// Load configuration from a TOML file (path via INTAKE_CONFIG or ./intake.toml),
    /// overlaying values onto env-driven defaults, then check the API keys.
    pub fn load() -> Result<Self> {
        let path = std::env::var("INTAKE_CONFIG").unwrap_or_else(|_| "intake.toml".into());
        let cfg = Self::load_from(Path::new(&path));
        cfg.validate()?;
        Ok(cfg)
    }

    /// Env defaults with the TOML file at `path` overlaid. A missing or broken
    /// file leaves the defaults in place.
    pub fn load_from(path: &Path) -> Self {
        let default = Self::default();
        if !path.exists() {
            tracing::info!(target: "config", path = %path.display(), "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(path) {
            Ok(s) => match Self::overlay_toml(default.clone(), &s) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(target: "config", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target: "config", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    /// Overlay a TOML document onto `base`
    pub fn overlay_toml(base: Self, toml_src: &str) -> Result<Self> {
        let t: IntakeToml = toml::from_str(toml_src)
            .map_err(|e| IntakeError::Config(format!("invalid TOML: {e}")))?;
        Ok(t.overlay(base))
    }

    /// Both provider keys are required; the service must not start without them
    pub fn validate(&self) -> Result<()> {
        if self.openrouter.api_key.trim().is_empty() {
            return Err(IntakeError::Config(
                "OPENROUTER_API_KEY is not defined".to_string(),
            ));
        }
        if self.gemini.api_key.trim().is_empty() {
            return Err(IntakeError::Config(
                "GEMINI_API_KEY is not defined for fallback usage".to_string(),
            ));
        }
        Ok(())
    }
}

// =========================
// TOML overlay definitions
// =========================

// API keys are deliberately absent: they only come from the environment.

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct IntakeToml {
    pub openrouter: Option<OpenRouterToml>,
    pub gemini: Option<GeminiToml>,
    pub retry: Option<RetryToml>,
    pub prompt: Option<PromptToml>,
}

impl IntakeToml {
    fn overlay(self, mut base: AssessmentConfig) -> AssessmentConfig {
        if let Some(o) = self.openrouter {
            o.apply(&mut base.openrouter);
        }
        if let Some(g) = self.gemini {
            g.apply(&mut base.gemini);
        }
        if let Some(r) = self.retry {
            r.apply(&mut base.retry);
        }
        if let Some(p) = self.prompt {
            p.apply(&mut base.prompt);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct OpenRouterToml {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub http_referer: Option<String>,
    pub x_title: Option<String>,
    pub request_timeout_ms: Option<u64>,
}
impl OpenRouterToml {
    fn apply(self, o: &mut OpenRouterConfig) {
        if let Some(x) = self.endpoint {
            o.endpoint = x;
        }
        if let Some(x) = self.model {
            o.model = x;
        }
        if let Some(x) = self.http_referer {
            o.http_referer = x;
        }
        if let Some(x) = self.x_title {
            o.x_title = x;
        }
        if let Some(x) = self.request_timeout_ms {
            o.request_timeout_ms = Some(x);
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct GeminiToml {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub request_timeout_ms: Option<u64>,
}
impl GeminiToml {
    fn apply(self, g: &mut GeminiConfig) {
        if let Some(x) = self.base_url {
            g.base_url = x;
        }
        if let Some(x) = self.model {
            g.model = x;
        }
        if let Some(x) = self.request_timeout_ms {
            g.request_timeout_ms = Some(x);
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct RetryToml {
    pub max_attempts: Option<u32>,
    pub delay_ms: Option<u64>,
}
impl RetryToml {
    fn apply(self, r: &mut RetryConfig) {
        if let Some(x) = self.max_attempts {
            r.max_attempts = x;
        }
        if let Some(x) = self.delay_ms {
            r.delay_ms = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct PromptToml {
    pub response_language: Option<String>,
}
impl PromptToml {
    fn apply(self, p: &mut PromptOptions) {
        if let Some(x) = self.response_language.filter(|s| !s.trim().is_empty()) {
            p.response_language = x;
        }
    }
}
