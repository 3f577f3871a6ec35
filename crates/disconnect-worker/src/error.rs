use thiserror::Error;

#[derive(Error, Debug)]
pub enum DisconnectWorkerError {
    #[error("durable store error: {0}")]
    Durable(#[from] durable_store::DurableStoreError),

    #[error("ttl store error: {0}")]
    Ttl(#[from] ttl_store::TtlStoreError),
}

impl DisconnectWorkerError {
    pub fn kind(&self) -> control_core::ErrorKind {
        match self {
            DisconnectWorkerError::Durable(e) => e.kind(),
            DisconnectWorkerError::Ttl(e) => e.kind(),
        }
    }
}

pub type DisconnectWorkerResult<T> = Result<T, DisconnectWorkerError>;
