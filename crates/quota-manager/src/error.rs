use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuotaError {
    #[error("durable store error: {0}")]
    Durable(#[from] durable_store::DurableStoreError),

    #[error("ttl store error: {0}")]
    Ttl(#[from] ttl_store::TtlStoreError),
}

impl QuotaError {
    pub fn kind(&self) -> control_core::ErrorKind {
        match self {
            QuotaError::Durable(e) => e.kind(),
            QuotaError::Ttl(e) => e.kind(),
        }
    }
}

pub type QuotaResult<T> = Result<T, QuotaError>;
