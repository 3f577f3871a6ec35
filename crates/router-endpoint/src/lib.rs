//! Inbound router endpoint (§4.1): accepts long-lived router connections,
//! authenticates, registers them in the cluster-wide connection registry,
//! and pumps liveness + frame dispatch. Also owns the local half of the
//! `send-to-router` transport every cross-instance component dispatches
//! through (§9 Design Notes).

mod dispatch;
mod endpoint;
mod error;
mod messages;

pub use dispatch::{DispatchOutcome, LocalRouters, RouterDispatch};
pub use endpoint::{EndpointConfig, RouterEndpoint, RouterEvent, RouterEventKind};
pub use error::{EndpointError, EndpointResult};
pub use messages::{FromRouterFrame, ToRouterFrame};
