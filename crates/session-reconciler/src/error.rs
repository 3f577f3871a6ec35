use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcilerError {
    #[error("durable store error: {0}")]
    Durable(#[from] durable_store::DurableStoreError),

    #[error("quota manager error: {0}")]
    Quota(#[from] quota_manager::QuotaError),
}

impl ReconcilerError {
    pub fn kind(&self) -> control_core::ErrorKind {
        match self {
            ReconcilerError::Durable(e) => e.kind(),
            ReconcilerError::Quota(e) => e.kind(),
        }
    }
}

pub type ReconcilerResult<T> = Result<T, ReconcilerError>;
