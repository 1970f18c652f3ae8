use std::sync::Arc;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use crate::backend::schemas::HistoryEntry;
use crate::backend::state::GenState;
use crate::error::AppError;

pub async fn list_history(State(state): State<Arc<GenState>>) -> Json<Vec<HistoryEntry>> {
    let entries = state
        .history()
        .iter()
        .enumerate()
        .map(|(index, record)| HistoryEntry::new(index, record))
        .collect();
    Json(entries)
}

pub async fn download_artifact(
    State(state): State<Arc<GenState>>,
    Path(index): Path<usize>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.store().clone();
    let (record, bytes) = tokio::task::spawn_blocking(move || store.load(index))
        .await
        .map_err(|e| AppError::BackendError(e.to_string()))??;

    let disposition = format!("attachment; filename=\"{}\"", record.file_name());
    Ok((
        [
            (header::CONTENT_TYPE, record.format.mime_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}
