use tracing_subscriber::{fmt, EnvFilter};

use intake_core::{AssessmentConfig, AssessmentPipeline};
use intake_server::{serve, AppState, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,intake_core=info,intake_server=info"));
    fmt().with_env_filter(env_filter).compact().init();

    // Refuse to start without both provider keys
    let config = AssessmentConfig::load()?;
    tracing::info!(
        target: "intake_server",
        primary_model = %config.openrouter.model,
        fallback_model = %config.gemini.model,
        max_attempts = config.retry.max_attempts,
        "Configuration loaded"
    );

    let pipeline = AssessmentPipeline::from_config(&config)?;
    let server_config = ServerConfig::from_env();

    serve(AppState::new(pipeline), server_config)
        .await
        .map_err(|e| e.into())
}
