use thiserror::Error;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("message bus transport error: {0}")]
    Transport(#[from] redis::RedisError),

    #[error("message bus serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BusError {
    pub fn kind(&self) -> control_core::ErrorKind {
        match self {
            BusError::Transport(_) => control_core::ErrorKind::Transport,
            BusError::Serialization(_) => control_core::ErrorKind::Internal,
        }
    }
}

pub type BusResult<T> = Result<T, BusError>;
