//! HTTP trigger surface
//!
//! # Routes
//!
//! - `GET  /health`                  liveness
//! - `GET  /api/cron/personas`       scheduled trigger (cron secret)
//! - `GET  /api/personas`            personas, topic seeds, activity (admin)
//! - `POST /api/personas`            topic seed admin (admin)
//! - `POST /api/personas/converse`   on-demand seed/reply (admin)
//! - `GET  /api/personas/workflows`  workflow overview (admin)
//! - `POST /api/personas/workflows`  workflow and batch actions (admin)

mod auth;
mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::EngineConfig;
use crate::error::{Error, FailureKind, Result};
use crate::orchestrator::Orchestrator;

pub use auth::{fingerprint, Credentials};
pub use handlers::{ConverseRequest, PersonaListQuery, PersonasRequest, WorkflowRequest};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub credentials: Credentials,
    pub cycle_timeout: Duration,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, config: &EngineConfig) -> Self {
        Self {
            orchestrator,
            credentials: Credentials::from_settings(&config.server),
            cycle_timeout: Duration::from_secs(config.scheduler.cycle_timeout_secs),
        }
    }
}

/// Engine error rendered as `{"error": ..., "code": ...}`.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if self.0.kind() == FailureKind::Internal || status.is_server_error() {
            error!(error = %self.0.format_for_log(), "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self.0, "Request rejected");
        }
        let body = json!({
            "error": self.0.to_string(),
            "code": self.0.code().as_str(),
        });
        (status, Json(body)).into_response()
    }
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/cron/personas", get(handlers::cron))
        .route(
            "/api/personas",
            get(handlers::personas_list).post(handlers::personas_action),
        )
        .route("/api/personas/converse", post(handlers::converse))
        .route(
            "/api/personas/workflows",
            get(handlers::workflows_overview).post(handlers::workflows_action),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(bind: &str, state: AppState, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind {}: {}", bind, e)))?;
    info!(bind, "Trigger server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Internal(format!("Server error: {}", e)))
}
