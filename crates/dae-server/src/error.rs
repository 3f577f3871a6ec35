use thiserror::Error;

#[derive(Error, Debug)]
pub enum DaeServerError {
    #[error("dae server io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("durable store error: {0}")]
    DurableStore(#[from] durable_store::DurableStoreError),
}

impl DaeServerError {
    pub fn kind(&self) -> control_core::ErrorKind {
        match self {
            DaeServerError::Io(_) => control_core::ErrorKind::Transport,
            DaeServerError::DurableStore(err) => err.kind(),
        }
    }
}

pub type DaeServerResult<T> = Result<T, DaeServerError>;
