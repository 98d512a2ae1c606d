//! HTTP front end
//!
//! `POST /benchmark` triggers one pipeline run; `GET /health` and `GET /ping`
//! answer liveness checks.

use crate::error::{PipelineError, ServiceError};
use crate::service::{BenchmarkService, ServiceOutcome};
use crate::request::BenchmarkRequest;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub const NO_CHANGES_BODY: &str = "No changes detected!";

#[derive(Debug, Clone)]
pub struct AppState {
    pub service: Arc<BenchmarkService>,
    /// Cancelled on shutdown; every in-flight run watches a child token
    pub shutdown: CancellationToken,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/benchmark", post(run_benchmark))
        .route("/health", get(health))
        .route("/ping", get(health))
        .with_state(Arc::new(state))
}

/// Serve until `state.shutdown` is cancelled
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    let shutdown = state.shutdown.clone();
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "benchkeeper listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn health() -> String {
    format!("Alive\n\n{}\n", chrono::Utc::now().timestamp())
}

async fn run_benchmark(
    State(state): State<Arc<AppState>>,
    body: Result<Json<BenchmarkRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, "invalid_request", &rejection.body_text());
        }
    };

    let repository = request.repository().to_string();
    info!(repository = %repository, public = request.public, "Benchmark requested");

    let cancel = state.shutdown.child_token();
    match state.service.handle(request, &cancel).await {
        Ok(ServiceOutcome::Reported(payload)) => (StatusCode::OK, Json(payload)).into_response(),
        Ok(ServiceOutcome::NoChange) => (StatusCode::OK, NO_CHANGES_BODY).into_response(),
        Err(err) => {
            tracing::warn!(repository = %repository, error = %err, "Benchmark request failed");
            ApiError(err).into_response()
        }
    }
}

struct ApiError(ServiceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.0.to_string();
        match self.0 {
            ServiceError::InvalidRequest(_) => {
                error_response(StatusCode::BAD_REQUEST, "invalid_request", &message)
            }
            ServiceError::Unauthorized { .. } => {
                error_response(StatusCode::UNAUTHORIZED, "unauthorized", &message)
            }
            ServiceError::Pipeline(err) => {
                let status = match err {
                    PipelineError::Measurement { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    PipelineError::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                error_response(status, err.stage(), &message)
            }
            ServiceError::Notification { payload, .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": { "code": "notification", "message": message },
                    "payload": payload,
                })),
            )
                .into_response(),
        }
    }
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(json!({ "error": { "code": code, "message": message } })),
    )
        .into_response()
}
