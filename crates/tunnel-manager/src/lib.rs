//! Bidirectional client<->router data tunnels (§4.5): `create` behind a
//! probe ack, `close` idempotent teardown, idle reaping, and cleanup on
//! router disconnect.

mod error;
mod manager;
mod session;

pub use error::{TunnelError, TunnelResult};
pub use manager::TunnelManager;
pub use session::ClientSink;
