//! HTTP import API.
//!
//! Exposes the importer to already-authenticated operator tooling (admin
//! panels, content scripts) as a single JSON endpoint.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/import` | Run one import call (all phases) |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! The request body is either a full request object or a bare JSON array,
//! which is interpreted as the flat `data` field. `type` and `setId` may
//! also be supplied as query parameters; body fields win when both are set.
//!
//! # Error Contract
//!
//! All error responses share one envelope:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "missing setId" } }
//! ```
//!
//! Error codes: `bad_request` (400 — missing/invalid `type`, `setId`, or
//! strategy), `not_found` (404 — target collection does not exist),
//! `internal` (500 — unexpected failure outside the per-item error path).
//! Per-item failures are not errors at this layer: they arrive inside a 200
//! summary with exact counts and up to 10 concrete descriptions.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser-based admin
//! clients can call the API cross-origin.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::db;
use crate::error::ImportError;
use crate::ingest::{run_import, CollectionLocks};
use crate::models::{ImportRequest, ImportSummary};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    pool: SqlitePool,
    config: Arc<Config>,
    locks: Arc<CollectionLocks>,
}

/// Builds the router. Split out from [`run_server`] so tests can bind it to
/// an ephemeral port.
pub fn app(pool: SqlitePool, config: Arc<Config>) -> Router {
    let state = AppState {
        pool,
        config,
        locks: Arc::new(CollectionLocks::new()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/import", post(handle_import))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Starts the import API server on the address configured in
/// `[server].bind`. Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    let bind_addr = config.server.bind.clone();
    let router = app(pool, Arc::new(config.clone()));

    println!("import API listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, router).await?;

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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Maps importer failures onto HTTP statuses: typed precondition failures
/// carry their own classification; anything else is a 500.
fn classify_import_error(err: anyhow::Error) -> AppError {
    match err.downcast_ref::<ImportError>() {
        Some(ImportError::CollectionNotFound { .. }) => not_found(err.to_string()),
        Some(_) => bad_request(err.to_string()),
        None => internal(format!("import failed: {}", err)),
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

// ============ POST /import ============

#[derive(Deserialize)]
struct ImportQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(rename = "setId")]
    set_id: Option<i64>,
}

async fn handle_import(
    State(state): State<AppState>,
    Query(query): Query<ImportQuery>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<ImportSummary>, AppError> {
    let mut request = parse_request(body)?;
    if request.kind.is_none() {
        request.kind = query.kind;
    }
    if request.set_id.is_none() {
        request.set_id = query.set_id;
    }

    let summary = run_import(&state.pool, &state.locks, &state.config, request)
        .await
        .map_err(classify_import_error)?;

    Ok(Json(summary))
}

fn parse_request(body: serde_json::Value) -> Result<ImportRequest, AppError> {
    match body {
        serde_json::Value::Array(items) => Ok(ImportRequest {
            data: Some(items),
            ..Default::default()
        }),
        other => serde_json::from_value(other)
            .map_err(|e| bad_request(format!("invalid import request: {}", e))),
    }
}
