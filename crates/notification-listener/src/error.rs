use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("durable store error: {0}")]
    Durable(#[from] durable_store::DurableStoreError),

    #[error("ttl store error: {0}")]
    Ttl(#[from] ttl_store::TtlStoreError),

    #[error("quota manager error: {0}")]
    Quota(#[from] quota_manager::QuotaError),
}

impl NotificationError {
    pub fn kind(&self) -> control_core::ErrorKind {
        match self {
            NotificationError::Durable(e) => e.kind(),
            NotificationError::Ttl(e) => e.kind(),
            NotificationError::Quota(e) => e.kind(),
        }
    }
}

pub type NotificationResult<T> = Result<T, NotificationError>;
