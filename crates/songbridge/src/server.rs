//! HTTP bridge for the browser page.
//!
//! | route          | purpose                                   |
//! |----------------|-------------------------------------------|
//! | `GET /status`  | catalog size, gate state, dry-run flag    |
//! | `GET /songs`   | catalog with group assignments            |
//! | `POST /select` | resolve + plan + dispatch                 |
//! | `POST /plan`   | resolve + plan only                       |
//! | `POST /cancel` | cancel the in-flight dispatch             |
//! | `POST /reload` | re-read the catalog CSV                   |
//!
//! Dispatch blocks for the whole key sequence, so it runs on the blocking
//! pool and the accept loop stays responsive.

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use songbridge_core::config::ServerConfig;
use songbridge_core::plan::{InputStep, PlanTrace};
use songbridge_core::{
    BridgeStatus, DispatchOptions, NavError, NavigationBridge, NavigationQuery, NavigationReport,
    Song,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub bridge: Arc<NavigationBridge>,
    /// CSV re-read by `POST /reload`.
    pub catalog_path: PathBuf,
}

pub fn router(state: AppState, allow_origin: &str) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/songs", get(songs))
        .route("/select", post(select))
        .route("/plan", post(plan))
        .route("/cancel", post(cancel))
        .route("/reload", post(reload))
        .layer(cors_layer(allow_origin))
        .with_state(state)
}

fn cors_layer(allow_origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allow_origin.trim() == "*" {
        return layer.allow_origin(Any);
    }
    match allow_origin.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            warn!("Invalid CORS origin '{}', allowing any origin", allow_origin);
            layer.allow_origin(Any)
        }
    }
}

/// Bind and serve until Ctrl+C.
pub async fn serve(state: AppState, config: &ServerConfig) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let status = state.bridge.status();
    info!("SongBridge listening on http://{}", addr);
    info!(
        "  Catalog: {} songs from {}",
        status.song_count,
        state.catalog_path.display()
    );
    info!("  Backend: {} (dry run: {})", status.backend, status.dry_run);

    axum::serve(listener, router(state, &config.allow_origin))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("SongBridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down...");
}

// =============================================================================
// Payloads
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectRequest {
    #[serde(flatten)]
    pub query: NavigationQuery,
    /// Overrides the configured dry-run default for this request.
    #[serde(default, alias = "dry_run")]
    pub dry_run: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    status: &'static str,
    #[serde(flatten)]
    bridge: BridgeStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SongsResponse {
    count: usize,
    songs: Vec<Song>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SelectResponse {
    status: &'static str,
    #[serde(flatten)]
    report: NavigationReport,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanResponse {
    status: &'static str,
    song: Song,
    steps: Vec<InputStep>,
    trace: PlanTrace,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CancelResponse {
    status: &'static str,
    cancelled: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReloadResponse {
    status: &'static str,
    song_count: usize,
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug)]
pub enum ApiError {
    Nav(NavError),
    BadRequest(String),
    Internal(String),
}

impl From<NavError> for ApiError {
    fn from(err: NavError) -> Self {
        ApiError::Nav(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    status: &'static str,
    code: &'static str,
    message: String,
    retry_safe: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    completed_steps: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keys_sent: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_step: Option<InputStep>,
}

/// HTTP status for a request-path error.
pub fn status_for(err: &NavError) -> StatusCode {
    match err {
        NavError::InvalidQuery => StatusCode::BAD_REQUEST,
        NavError::SongNotFound { .. } => StatusCode::NOT_FOUND,
        NavError::Busy | NavError::Cancelled { .. } => StatusCode::CONFLICT,
        NavError::WindowNotFound { .. } => StatusCode::SERVICE_UNAVAILABLE,
        NavError::DispatchAborted { .. }
        | NavError::Catalog(_)
        | NavError::WorkerUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Nav(err) => {
                let (completed_steps, keys_sent, last_step) = match &err {
                    NavError::DispatchAborted {
                        completed_steps,
                        keys_sent,
                        last_step,
                        ..
                    } => (Some(*completed_steps), Some(*keys_sent), *last_step),
                    NavError::Cancelled {
                        completed_steps,
                        keys_sent,
                    } => (Some(*completed_steps), Some(*keys_sent), None),
                    _ => (None, None, None),
                };
                let body = ErrorBody {
                    status: "error",
                    code: err.code(),
                    message: err.to_string(),
                    retry_safe: err.is_retry_safe(),
                    completed_steps,
                    keys_sent,
                    last_step,
                };
                (status_for(&err), body)
            }
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    status: "error",
                    code: "bad_request",
                    message,
                    retry_safe: true,
                    completed_steps: None,
                    keys_sent: None,
                    last_step: None,
                },
            ),
            ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    status: "error",
                    code: "internal",
                    message,
                    retry_safe: false,
                    completed_steps: None,
                    keys_sent: None,
                    last_step: None,
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        bridge: state.bridge.status(),
    })
}

async fn songs(State(state): State<AppState>) -> Json<SongsResponse> {
    let catalog = state.bridge.catalog();
    Json(SongsResponse {
        count: catalog.len(),
        songs: catalog.songs().to_vec(),
    })
}

async fn select(
    State(state): State<AppState>,
    payload: Result<Json<SelectRequest>, JsonRejection>,
) -> Result<Json<SelectResponse>, ApiError> {
    let Json(request) = payload?;
    let bridge = state.bridge.clone();
    let options = DispatchOptions {
        dry_run: request.dry_run,
        cancel: None,
    };

    let result = tokio::task::spawn_blocking(move || bridge.navigate(&request.query, options))
        .await
        .map_err(|e| ApiError::Internal(format!("dispatch task failed: {}", e)))?;

    match result {
        Ok(report) => Ok(Json(SelectResponse {
            status: "ok",
            report,
        })),
        Err(err) => {
            if err.sent_input() {
                error!("Select failed after sending input: {}", err);
            } else {
                info!("Select rejected: {}", err);
            }
            Err(err.into())
        }
    }
}

async fn plan(
    State(state): State<AppState>,
    payload: Result<Json<NavigationQuery>, JsonRejection>,
) -> Result<Json<PlanResponse>, ApiError> {
    let Json(query) = payload?;
    let plan = state.bridge.plan_query(&query)?;
    Ok(Json(PlanResponse {
        status: "ok",
        song: plan.song,
        steps: plan.steps,
        trace: plan.trace,
    }))
}

async fn cancel(State(state): State<AppState>) -> Json<CancelResponse> {
    Json(CancelResponse {
        status: "ok",
        cancelled: state.bridge.cancel_active(),
    })
}

async fn reload(State(state): State<AppState>) -> Result<Json<ReloadResponse>, ApiError> {
    let bridge = state.bridge.clone();
    let path = state.catalog_path.clone();
    let song_count = tokio::task::spawn_blocking(move || bridge.reload_csv(&path))
        .await
        .map_err(|e| ApiError::Internal(format!("reload task failed: {}", e)))??;
    Ok(Json(ReloadResponse {
        status: "ok",
        song_count,
    }))
}
