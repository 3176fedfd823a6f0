//! Job endpoint routes

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use panomedia_core::models::JobKind;
use panomedia_core::AppError;
use panomedia_worker::{JobErrorBody, JobQueueClient, JobResultBody};
use serde_json::{json, Value};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::error::HttpAppError;
use crate::state::AppState;

/// Job payloads carry base64 images.
const MAX_JOB_BODY_BYTES: usize = 256 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/jobs/{name}", post(run_job))
        .layer(RequestBodyLimitLayer::new(MAX_JOB_BODY_BYTES))
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Runs the named job on the local queue and answers with its outcome.
#[tracing::instrument(skip(state, payload))]
async fn run_job(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, HttpAppError> {
    let kind: JobKind = name.parse().map_err(|_| AppError::not_found("job"))?;
    let Json(payload) = payload?;

    let response = match state.queue.submit_job(kind, payload).await {
        Ok(result) => Json(JobResultBody { result }).into_response(),
        Err(fault) => {
            let status = StatusCode::from_u16(fault.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(JobErrorBody::from(&fault))).into_response()
        }
    };
    Ok(response)
}
