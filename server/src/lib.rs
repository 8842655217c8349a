// Intake HTTP server
//
// Thin axum front for the assessment pipeline: validates the intake record,
// runs the assessment and maps failures to JSON error bodies.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use intake_core::{AssessmentEnvelope, AssessmentPipeline, PatientIntakeRecord};
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info, warn};

/// Largest accepted request body
pub const BODY_LIMIT_BYTES: usize = 1024 * 1024;

const INCOMPLETE_INPUT: &str = "ข้อมูลไม่ครบถ้วน";
const REQUIRED_FIELDS: &str =
    "ข้อมูลพื้นฐาน (ชื่อ, อายุ, เพศ, น้ำหนัก, ส่วนสูง, อาการ) เป็นสิ่งจำเป็น";
const SERVER_FAILURE: &str = "เกิดข้อผิดพลาดรุนแรงบนเซิร์ฟเวอร์";

/// Listen address and allowed browser origins
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: String,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:3001".to_string(),
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3001".to_string(),
            ],
        }
    }
}

impl ServerConfig {
    /// `INTAKE_ADDR` and comma-separated `INTAKE_CORS_ORIGINS` over the defaults
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            addr: std::env::var("INTAKE_ADDR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(default.addr),
            cors_origins: std::env::var("INTAKE_CORS_ORIGINS")
                .ok()
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect::<Vec<_>>()
                })
                .filter(|origins| !origins.is_empty())
                .unwrap_or(default.cors_origins),
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        self.addr
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid INTAKE_ADDR {}: {e}", self.addr)))
    }
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<AssessmentPipeline>,
}

impl AppState {
    pub fn new(pipeline: AssessmentPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Build the API router with CORS and the body limit applied
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/api/assess", post(assess_handler))
        .route("/api/health", get(health_handler))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(cors_layer(&config.cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(target: "intake_server", origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect::<Vec<_>>();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE])
}

/// Bind `config.addr` and serve until the process is stopped
pub async fn serve(state: AppState, config: ServerConfig) -> Result<(), ServerError> {
    let addr = config.socket_addr()?;
    let app = router(state, &config);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        target: "intake_server",
        url = %format!("http://{}", addr),
        "Intake server ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

/// JSON error body shared by all failure responses
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    details: String,
}

/// Handler failures mapped onto status codes
#[derive(Debug)]
enum ApiError {
    BadRequest,
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: INCOMPLETE_INPUT,
                    details: REQUIRED_FIELDS.to_string(),
                },
            ),
            ApiError::Internal(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: SERVER_FAILURE,
                    details,
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

async fn assess_handler(
    State(state): State<AppState>,
    payload: Result<Json<PatientIntakeRecord>, JsonRejection>,
) -> Result<Json<AssessmentEnvelope>, ApiError> {
    let Json(record) = payload.map_err(|e| {
        warn!(target: "intake_server", error = %e, "Rejected assessment request body");
        ApiError::BadRequest
    })?;

    if let Err(e) = record.validate() {
        warn!(target: "intake_server", error = %e, "Rejected incomplete intake record");
        return Err(ApiError::BadRequest);
    }

    info!(target: "intake_server", "Assessment requested");
    match state.pipeline.assess(&record).await {
        Ok(envelope) => Ok(Json(envelope)),
        Err(e) => {
            error!(target: "intake_server", error = %e, "Assessment failed");
            Err(ApiError::Internal(e.to_string()))
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
