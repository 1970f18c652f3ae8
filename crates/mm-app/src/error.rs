use std::path::PathBuf;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mm_core::CoreError;
use mm_gen::GenError;
use mm_mesh::MeshError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required credential {0}; set it in the environment or .env")]
    MissingCredential(&'static str),

    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to read .env file: {0}")]
    DotEnv(#[from] dotenvy::Error),
}

#[derive(Error, Debug)]
pub enum TextServiceError {
    #[error("failed to reach text service: {0}")]
    Http(#[from] reqwest::Error),

    #[error("text service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("text service returned no text")]
    Empty,
}

#[derive(Error, Debug)]
pub enum FilenameError {
    #[error("filename synthesis failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid artifact filename '{0}'")]
    InvalidFilename(String),

    #[error(transparent)]
    Encode(#[from] MeshError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("artifact {path} is not readable: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no history entry at index {0}")]
    UnknownRecord(usize),
}

/// Terminal-for-request failures. Each renders as a single user-facing message.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] CoreError),

    #[error("generation failed: {0}")]
    Generation(#[from] GenError),

    #[error("mesh repair failed: {0}")]
    Mesh(#[from] MeshError),

    #[error("could not name the output file: {0}")]
    Filename(#[from] FilenameError),

    #[error("could not save the model: {0}")]
    Store(#[from] StoreError),

    #[error("text service setup failed: {0}")]
    TextService(#[from] TextServiceError),
}

/// Errors returned by the HTTP backend.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("a generation is already in progress")]
    Busy,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Error from backend: {0}")]
    BackendError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Busy => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UnknownRecord(_) => Self::NotFound(e.to_string()),
            other => Self::BackendError(other.to_string()),
        }
    }
}
