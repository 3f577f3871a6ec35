use thiserror::Error;

#[derive(Error, Debug)]
pub enum TtlStoreError {
    #[error("ttl store transport error: {0}")]
    Transport(#[from] redis::RedisError),

    #[error("ttl store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TtlStoreError {
    pub fn kind(&self) -> control_core::ErrorKind {
        match self {
            TtlStoreError::Transport(_) => control_core::ErrorKind::Transport,
            TtlStoreError::Serialization(_) => control_core::ErrorKind::Internal,
        }
    }
}

pub type TtlStoreResult<T> = Result<T, TtlStoreError>;
