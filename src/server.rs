//! HTTP server.
//!
//! Exposes ingestion and the read-side document views as a JSON HTTP API.
//! Handlers are thin: uploads go through [`crate::ingest::ingest_document`]
//! and every `GET /documents/...` route through [`crate::documents`], the
//! same functions the CLI calls.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/schema/fields` | Field catalogue and required keys |
//! | `POST` | `/upload?filename=..[&doc_id=..]` | Ingest a raw PDF body |
//! | `GET`  | `/documents/{id}/observations` | Full observation history |
//! | `GET`  | `/documents/{id}/resolved` | Resolved profile |
//! | `GET`  | `/documents/{id}/quality` | Quality report |
//! | `GET`  | `/documents/{id}/entities` | Entity summary |
//! | `GET`  | `/documents/{id}/text[?page=N]` | Page text preview of the latest run |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "document not found: 3f2c..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `unprocessable` (422),
//! `internal` (500).

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use credit_intake_core::registry::FieldRegistry;
use credit_intake_core::store::ObservationStore;

use crate::config::Config;
use crate::documents;
use crate::ingest::{ingest_document, IngestError, IngestReceipt, IngestRequest};
use crate::store_fs::JsonDirStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<FieldRegistry>,
    pub store: Arc<dyn ObservationStore>,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            config: Arc::new(config.clone()),
            registry: Arc::new(FieldRegistry::canonical()),
            store: Arc::new(JsonDirStore::from_config(config)),
        }
    }
}

/// Builds the router. Split from [`run_server`] so tests can drive it
/// without binding a socket.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Room for the query string and framing on top of the PDF itself.
    let body_limit = state.config.extraction.max_upload_bytes.saturating_add(64 * 1024);

    Router::new()
        .route("/health", get(handle_health))
        .route("/schema/fields", get(handle_fields))
        .route("/upload", post(handle_upload))
        .route("/documents/{id}/observations", get(handle_observations))
        .route("/documents/{id}/resolved", get(handle_resolved))
        .route("/documents/{id}/quality", get(handle_quality))
        .route("/documents/{id}/entities", get(handle_entities))
        .route("/documents/{id}/text", get(handle_text))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

/// Binds to `[server].bind` and serves until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(
        bind = %bind_addr,
        observation_dir = %config.storage.observation_dir.display(),
        "intake server listening"
    );
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn app_error(status: StatusCode, code: &str, message: impl Into<String>) -> AppError {
    AppError {
        status,
        code: code.to_string(),
        message: message.into(),
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    app_error(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn not_found(message: impl Into<String>) -> AppError {
    app_error(StatusCode::NOT_FOUND, "not_found", message)
}

fn unprocessable(message: impl Into<String>) -> AppError {
    app_error(StatusCode::UNPROCESSABLE_ENTITY, "unprocessable", message)
}

fn internal(message: impl Into<String>) -> AppError {
    app_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        let message = err.to_string();
        match err {
            IngestError::NotPdf(_) | IngestError::TooLarge { .. } | IngestError::InvalidDocId(_) => {
                bad_request(message)
            }
            IngestError::UnknownDocument(_) => not_found(message),
            IngestError::Unreadable(_) => unprocessable(message),
            IngestError::Core(_) | IngestError::Other(_) => {
                tracing::error!(error = %message, "ingestion failed");
                internal(message)
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        if documents::is_not_found(&err) {
            not_found(err.to_string())
        } else {
            tracing::error!(error = %format!("{:#}", err), "request failed");
            internal(format!("{:#}", err))
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /schema/fields ============

async fn handle_fields(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let view = serde_json::to_value(documents::fields(&state.registry))
        .map_err(|e| internal(e.to_string()))?;
    Ok(Json(view))
}

// ============ POST /upload ============

#[derive(Debug, Deserialize)]
struct UploadParams {
    filename: Option<String>,
    doc_id: Option<String>,
}

/// The body is the raw PDF. `filename` is required; `doc_id` re-ingests into
/// an existing document.
async fn handle_upload(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<Json<IngestReceipt>, AppError> {
    let filename = params
        .filename
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| bad_request("filename query parameter is required"))?;
    if body.is_empty() {
        return Err(bad_request("request body must not be empty"));
    }

    let request = IngestRequest {
        filename,
        bytes: body.to_vec(),
        doc_id: params.doc_id.filter(|d| !d.is_empty()),
    };
    let receipt = ingest_document(&state.config, &state.registry, state.store.as_ref(), request).await?;
    Ok(Json(receipt))
}

// ============ GET /documents/{id}/... ============

async fn handle_observations(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<documents::ObservationsView>, AppError> {
    Ok(Json(documents::observations(state.store.as_ref(), &id).await?))
}

async fn handle_resolved(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<documents::ResolvedView>, AppError> {
    Ok(Json(
        documents::resolved(&state.config, state.store.as_ref(), &id).await?,
    ))
}

async fn handle_quality(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<documents::QualityView>, AppError> {
    Ok(Json(
        documents::quality(&state.config, &state.registry, state.store.as_ref(), &id).await?,
    ))
}

async fn handle_entities(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<credit_intake_core::entities::EntityReport>, AppError> {
    Ok(Json(documents::entities(state.store.as_ref(), &id).await?))
}

#[derive(Debug, Deserialize)]
struct TextParams {
    page: Option<u32>,
}

async fn handle_text(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<TextParams>,
) -> Result<Json<documents::TextView>, AppError> {
    Ok(Json(
        documents::text(state.store.as_ref(), &id, params.page).await?,
    ))
}
