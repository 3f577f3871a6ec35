use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum TunnelError {
    #[error("router {0} is offline")]
    RouterOffline(String),

    #[error("probe for session {0} timed out waiting for tunnel-started")]
    ProbeTimeout(String),

    #[error("router rejected tunnel session {session_id}: {detail}")]
    Rejected { session_id: String, detail: String },

    #[error("transport error dispatching to router: {0}")]
    Transport(String),

    #[error("unknown tunnel session {0}")]
    UnknownSession(String),
}

impl TunnelError {
    pub fn kind(&self) -> control_core::ErrorKind {
        match self {
            TunnelError::RouterOffline(_) => control_core::ErrorKind::RouterOffline,
            TunnelError::ProbeTimeout(_) => control_core::ErrorKind::Timeout,
            TunnelError::Rejected { .. } => control_core::ErrorKind::RemoteError,
            TunnelError::Transport(_) => control_core::ErrorKind::Transport,
            TunnelError::UnknownSession(_) => control_core::ErrorKind::Conflict,
        }
    }
}

pub type TunnelResult<T> = Result<T, TunnelError>;
