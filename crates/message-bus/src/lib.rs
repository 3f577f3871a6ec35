//! Best-effort topic-based pub/sub fan-out across control-plane instances
//! (§4.3). Channel naming conventions live in `ttl-store::keys` since both
//! crates talk to the same Redis-shaped backend; this crate only owns the
//! publish/subscribe mechanics and the reconnect loop.

mod bus;
mod error;

pub use bus::{BusMessage, MessageBus};
pub use error::{BusError, BusResult};
