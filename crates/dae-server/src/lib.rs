//! Inbound RFC 5176 DAE server (§4.8): binds UDP/3799, accepts
//! Disconnect-Request and CoA-Request packets from routers (or anything
//! holding a router's shared secret), and replies ACK/NAK.
//!
//! Outbound CoA/Disconnect traffic is `coa-client`'s concern; this crate is
//! the inbound counterpart and shares `radius-proto`'s codec with it.

mod config;
mod error;
mod server;

pub use config::DaeServerConfig;
pub use error::{DaeServerError, DaeServerResult};
pub use server::DaeServer;
