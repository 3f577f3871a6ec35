//! Outbound CoA/Disconnect client (§4.8): sends a RADIUS-shaped packet to
//! a router's NAS address, UDP/3799, with a 5s timeout and no
//! retransmission at this layer.

mod client;
mod error;
mod request;

pub use client::{CoaClient, CoaOutcome};
pub use error::{CoaClientError, CoaClientResult};
pub use request::{CoaUpdateRequest, DisconnectRequest, NasIdentity};
