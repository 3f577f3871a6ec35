//! Core error type for configuration and path resolution.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("path error: {0}")]
    Path(String),
}

impl CoreError {
    pub fn kind(&self) -> control_core::ErrorKind {
        match self {
            CoreError::Config(_) | CoreError::Path(_) => control_core::ErrorKind::Internal,
            CoreError::Io(_) | CoreError::Json(_) => control_core::ErrorKind::Internal,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
