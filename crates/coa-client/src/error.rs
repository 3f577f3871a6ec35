use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoaClientError {
    #[error("coa client io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("coa client codec error: {0}")]
    Codec(#[from] radius_proto::RadiusCodecError),

    #[error("coa request timed out after 5s")]
    Timeout,

    #[error("coa request requires NAS-Identifier or NAS-IP-Address")]
    MissingNasIdentity,
}

impl CoaClientError {
    pub fn kind(&self) -> control_core::ErrorKind {
        match self {
            CoaClientError::Io(_) => control_core::ErrorKind::Transport,
            CoaClientError::Codec(_) => control_core::ErrorKind::Transport,
            CoaClientError::Timeout => control_core::ErrorKind::Timeout,
            CoaClientError::MissingNasIdentity => control_core::ErrorKind::Internal,
        }
    }
}

pub type CoaClientResult<T> = Result<T, CoaClientError>;
