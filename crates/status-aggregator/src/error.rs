use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatusError {
    #[error("durable store error: {0}")]
    Durable(#[from] durable_store::DurableStoreError),

    #[error("ttl store error: {0}")]
    Ttl(#[from] ttl_store::TtlStoreError),
}

impl StatusError {
    pub fn kind(&self) -> control_core::ErrorKind {
        match self {
            StatusError::Durable(e) => e.kind(),
            StatusError::Ttl(e) => e.kind(),
        }
    }
}

pub type StatusResult<T> = Result<T, StatusError>;
