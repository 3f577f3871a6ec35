use thiserror::Error;

/// The four failure shapes `send` can return (§4.4).
#[derive(Error, Debug, Clone)]
pub enum RpcError {
    #[error("router {0} is offline")]
    RouterOffline(String),

    #[error("rpc call to {router_id} timed out after {timeout_ms}ms")]
    Timeout { router_id: String, timeout_ms: u64 },

    #[error("transport error dispatching to {0}")]
    Transport(String),

    #[error("remote error from router: {detail}")]
    RemoteError { detail: serde_json::Value },
}

impl RpcError {
    pub fn kind(&self) -> control_core::ErrorKind {
        match self {
            RpcError::RouterOffline(_) => control_core::ErrorKind::RouterOffline,
            RpcError::Timeout { .. } => control_core::ErrorKind::Timeout,
            RpcError::Transport(_) => control_core::ErrorKind::Transport,
            RpcError::RemoteError { .. } => control_core::ErrorKind::RemoteError,
        }
    }
}

pub type RpcResult<T> = Result<T, RpcError>;
