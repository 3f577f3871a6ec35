//! Shared domain types and error taxonomy used across the control-plane workspace.
//!
//! Nothing here talks to the network, the shared TTL store, or the durable
//! store; those live in `ttl-store` and `durable-store`. This crate only
//! holds the identifiers and pure helpers every other crate agrees on.

mod error;
mod ids;
mod mac;
mod quota_units;

pub use error::ErrorKind;
pub use ids::{generate_command_id, generate_router_secret, generate_tunnel_session_id, InstanceId};
pub use mac::normalize_mac;
pub use quota_units::gb_to_octets;
