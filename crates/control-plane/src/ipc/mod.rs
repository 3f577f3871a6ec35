//! The operator control socket (§4.12, §4.14): a narrow Unix-socket surface
//! exposing `health`, `status`, and `shutdown` to the CLI front-end only.
//! Distinct from the router-facing network listener in `router-endpoint`
//! and not the HTTP admin API excluded in §1.

mod protocol;
mod server;

pub use protocol::{error_codes, ErrorInfo, Method, Request, Response};
pub use server::{IpcClient, IpcError, IpcResult, IpcServer};
