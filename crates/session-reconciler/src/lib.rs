//! Session reconciler (§4.10): reconciles durable accounting sessions
//! against each router's live client list, force-closing sessions whose
//! user should be disabled or whose MAC is no longer present on the router.

mod error;
mod manager;

pub use error::{ReconcilerError, ReconcilerResult};
pub use manager::{ReconcileOutcome, SessionReconciler};
