//! Disconnect queue drain worker (§4.7).
//!
//! Batches unprocessed rows out of the durable `disconnect_queue` table,
//! resolves each user's currently active accounting sessions, and issues
//! CoA-Disconnect to every router hosting one. A queue item is marked
//! processed only once every router has either acked the disconnect or is
//! known offline (in which case the session reconciler cleans it up on
//! reconnect). Failed attempts retry with exponential backoff, up to a
//! configured ceiling, after which the item is marked failed but left in
//! place for operator visibility.

mod config;
mod error;
mod job;
mod worker;

pub use config::WorkerConfig;
pub use error::{DisconnectWorkerError, DisconnectWorkerResult};
pub use worker::DisconnectWorker;
