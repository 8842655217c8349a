//! Assessment pipeline: BMI, prompt, provider chain, parse, normalize,
//! retried as one unit with a pluggable backoff.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::bmi::{calculate_bmi, BmiResult};
use crate::config::{AssessmentConfig, RetryConfig};
use crate::llm::ProviderChain;
use crate::normalize::{normalize, NormalizedAssessment};
use crate::patient::{PatientIntakeRecord, Scalar};
use crate::prompt::{build_prompt, PromptOptions};
use crate::{IntakeError, Result};

/// Longest excerpt of an unparseable response that may reach the logs
const LOG_EXCERPT_CHARS: usize = 500;

/// Maps a failed attempt number (1-based) to the pause before the next one
pub trait Backoff: Send + Sync {
    fn delay(&self, attempt: u32) -> Duration;
}

/// Same pause after every failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedBackoff {
    delay: Duration,
}

impl FixedBackoff {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// No pause at all
    pub fn none() -> Self {
        Self::new(Duration::ZERO)
    }
}

impl Backoff for FixedBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Arc<dyn Backoff>,
}

impl RetryPolicy {
    /// `max_attempts` below 1 is raised to 1
    pub fn new(max_attempts: u32, backoff: Arc<dyn Backoff>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::new(max_attempts, Arc::new(FixedBackoff::new(delay)))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pause after failed `attempt`, or `None` when it was the last one
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_attempts).then(|| self.backoff.delay(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_millis(2_000))
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self::fixed(cfg.max_attempts, Duration::from_millis(cfg.delay_ms))
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserInfo {
    pub name: Option<String>,
    pub age: Option<Scalar>,
    pub sex: Option<String>,
}

/// BMI plus the measurements it was computed from, echoed as received
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BmiSummary {
    #[serde(flatten)]
    pub bmi: BmiResult,
    pub weight: Option<Scalar>,
    pub height: Option<Scalar>,
}

/// Final result of a successful assessment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentEnvelope {
    #[serde(rename = "userInfo")]
    pub user_info: UserInfo,
    pub bmi: BmiSummary,
    pub analysis: NormalizedAssessment,
}

/// Runs assessments. Holds no per-request state; share it behind an `Arc`.
pub struct AssessmentPipeline {
    providers: ProviderChain,
    retry: RetryPolicy,
    prompt: PromptOptions,
}

impl AssessmentPipeline {
    pub fn new(providers: ProviderChain, retry: RetryPolicy, prompt: PromptOptions) -> Self {
        Self {
            providers,
            retry,
            prompt,
        }
    }

    pub fn from_config(cfg: &AssessmentConfig) -> Result<Self> {
        Ok(Self::new(
            ProviderChain::from_config(cfg)?,
            RetryPolicy::from(&cfg.retry),
            cfg.prompt.clone(),
        ))
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Assess one intake record.
    ///
    /// Each attempt builds the prompt, runs the provider chain, parses and
    /// normalizes the answer. Failed attempts are retried after the backoff
    /// delay; once attempts run out the last error is wrapped in
    /// `IntakeError::RetriesExhausted`.
    pub async fn assess(&self, record: &PatientIntakeRecord) -> Result<AssessmentEnvelope> {
        let bmi = calculate_bmi(record.weight.as_ref(), record.height.as_ref());
        let max_attempts = self.retry.max_attempts();
        info!(target: "assessment", max_attempts, "Starting assessment");

        let mut attempt = 1;
        let analysis = loop {
            info!(target: "assessment", attempt, max_attempts, "Calling AI");
            match self.attempt(record, &bmi).await {
                Ok(analysis) => break analysis,
                Err(e) => {
                    warn!(target: "assessment", attempt, max_attempts, error = %e, "Attempt failed");
                    match self.retry.delay_after(attempt) {
                        Some(delay) => {
                            if !delay.is_zero() {
                                tokio::time::sleep(delay).await;
                            }
                            attempt += 1;
                        }
                        None => {
                            error!(target: "assessment", attempts = attempt, "Giving up on assessment");
                            return Err(IntakeError::RetriesExhausted {
                                attempts: attempt,
                                last: Box::new(e),
                            });
                        }
                    }
                }
            }
        };

        Ok(AssessmentEnvelope {
            user_info: UserInfo {
                name: record.name.clone(),
                age: record.age.clone(),
                sex: record.sex.clone(),
            },
            bmi: BmiSummary {
                bmi,
                weight: record.weight.clone(),
                height: record.height.clone(),
            },
            analysis,
        })
    }

    async fn attempt(
        &self,
        record: &PatientIntakeRecord,
        bmi: &BmiResult,
    ) -> Result<NormalizedAssessment> {
        let prompt = build_prompt(record, bmi, &self.prompt);
        let reply = self.providers.generate(&prompt).await?;
        let parsed = parse_response(&reply.text)?;
        info!(target: "assessment", provider = %reply.provider, "Parsed JSON response");
        Ok(normalize(&parsed))
    }
}

/// Parse provider text as a JSON object. Only a bounded excerpt of bad text is logged.
fn parse_response(text: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(text).map_err(|e| {
        error!(
            target: "assessment",
            error = %e,
            excerpt = %excerpt(text, LOG_EXCERPT_CHARS),
            "Failed to parse JSON response"
        );
        IntakeError::Parse(e.to_string())
    })?;
    if !value.is_object() {
        error!(
            target: "assessment",
            excerpt = %excerpt(text, LOG_EXCERPT_CHARS),
            "JSON response is not an object"
        );
        return Err(IntakeError::Parse("expected a JSON object".to_string()));
    }
    Ok(value)
}

/// First `max_chars` characters of `text`, cut on a char boundary
fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
