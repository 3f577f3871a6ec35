use thiserror::Error;

#[derive(Error, Debug)]
pub enum DurableStoreError {
    #[error("durable store error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

impl DurableStoreError {
    pub fn kind(&self) -> control_core::ErrorKind {
        match self {
            DurableStoreError::Sql(_) => control_core::ErrorKind::Transport,
            DurableStoreError::NotFound(_) => control_core::ErrorKind::Internal,
            DurableStoreError::Conflict(_) => control_core::ErrorKind::Conflict,
        }
    }
}

pub type DurableStoreResult<T> = Result<T, DurableStoreError>;
