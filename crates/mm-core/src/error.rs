use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid generation parameters: {0}")]
    InvalidParameters(String),

    #[error("unsupported format: '{0}' (expected one of obj, ply, stl, glb)")]
    UnsupportedFormat(String),

    #[error("invalid dimensions '{0}': expected LxWxH followed by an optional unit")]
    InvalidDimensions(String),
}
