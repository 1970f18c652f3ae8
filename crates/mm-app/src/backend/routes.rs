use std::sync::Arc;
use axum::Router;
use axum::routing::{get, post};
use crate::backend::routes::history::{download_artifact, list_history};
use crate::backend::routes::job::{create_job, job_status};
use crate::backend::state::GenState;

mod history;
mod job;

pub fn api_routes() -> Router<Arc<GenState>> {
    Router::new()
        .route("/generate", post(create_job))
        .route("/status", get(job_status))
        .route("/history", get(list_history))
        .route("/history/{index}/file", get(download_artifact))
}
