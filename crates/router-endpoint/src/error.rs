use thiserror::Error;

#[derive(Error, Debug)]
pub enum EndpointError {
    #[error("router authentication failed")]
    Policy,

    #[error("websocket transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("durable store error: {0}")]
    Durable(#[from] durable_store::DurableStoreError),

    #[error("ttl store error: {0}")]
    Ttl(#[from] ttl_store::TtlStoreError),

    #[error("message bus error: {0}")]
    Bus(#[from] message_bus::BusError),

    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),

    #[error("router {0} is offline")]
    RouterOffline(String),

    #[error("internal setup failure: {0}")]
    Internal(String),
}

impl EndpointError {
    pub fn kind(&self) -> control_core::ErrorKind {
        match self {
            EndpointError::Policy => control_core::ErrorKind::Policy,
            EndpointError::Transport(_) => control_core::ErrorKind::Transport,
            EndpointError::Durable(e) => e.kind(),
            EndpointError::Ttl(e) => e.kind(),
            EndpointError::Bus(e) => e.kind(),
            EndpointError::MalformedFrame(_) => control_core::ErrorKind::Internal,
            EndpointError::RouterOffline(_) => control_core::ErrorKind::RouterOffline,
            EndpointError::Internal(_) => control_core::ErrorKind::Internal,
        }
    }

    /// WebSocket close code this error maps to (§4.1: `policy` for bad
    /// credentials, `internal` for setup failure).
    pub fn close_code(&self) -> tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode {
        use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
        match self {
            EndpointError::Policy => CloseCode::Policy,
            _ => CloseCode::Error,
        }
    }
}

pub type EndpointResult<T> = Result<T, EndpointError>;
