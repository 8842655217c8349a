// Intake Core Library
// AI assessment orchestration for patient intake records

pub mod assessment;
pub mod bmi;
pub mod config;
pub mod llm;
pub mod normalize;
pub mod patient;
pub mod prompt;

// Export core types
pub use assessment::{
    AssessmentEnvelope, AssessmentPipeline, Backoff, BmiSummary, FixedBackoff, RetryPolicy,
    UserInfo,
};
pub use bmi::{calculate_bmi, BmiCategory, BmiResult};
pub use config::AssessmentConfig;
pub use llm::{CompletionProvider, ProviderChain, ProviderError, ProviderReply};
pub use normalize::{normalize, NormalizedAssessment, RiskLevel};
pub use patient::{PatientIntakeRecord, Scalar};
pub use prompt::{build_context, build_prompt, PromptOptions};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntakeError {
    /// Both providers failed. Only the fallback's message is displayed; the
    /// primary failure stays available for inspection.
    #[error("AI service failed: {fallback}")]
    ProvidersFailed {
        primary: ProviderError,
        fallback: ProviderError,
    },

    #[error("AI service returned invalid response format: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Could not communicate with AI after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<IntakeError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    Client(String),
}

pub type Result<T> = std::result::Result<T, IntakeError>;
