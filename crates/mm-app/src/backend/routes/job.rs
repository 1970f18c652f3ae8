use std::sync::Arc;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use mm_core::GenerationRequest;
use tracing::info;
use crate::backend::schemas::JobCreateResponse;
use crate::backend::state::GenState;
use crate::error::AppError;

pub async fn create_job(
    State(state): State<Arc<GenState>>,
    body: Result<Json<GenerationRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let job = state.submit(request)?;
    info!("Queued job {}", job.id);

    Ok((
        StatusCode::ACCEPTED,
        Json(JobCreateResponse {
            id: job.id,
            status: job.status,
            message: job.message,
        }),
    ))
}

pub async fn job_status(State(state): State<Arc<GenState>>) -> Result<impl IntoResponse, AppError> {
    state
        .current_job()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("no job has been submitted".into()))
}
