//! Key and channel naming conventions for the shared TTL store (§6).

/// TTL (seconds) for `router:heartbeat:<id>` and `router:online:<id>` (§4.2).
pub const HEARTBEAT_TTL_SECS: u64 = 60;
/// TTL (seconds) for `router:connection:<id>` (§4.2); renewed every `ttl/2`.
pub const CONNECTION_TTL_SECS: u64 = 60;
/// How often an open connection renews its registry fact (§4.1, §4.2).
pub const CONNECTION_RENEW_SECS: u64 = CONNECTION_TTL_SECS / 2;
/// TTL (seconds) for `user:sessions:<username>` counters.
pub const USER_SESSIONS_TTL_SECS: u64 = 86_400;

pub fn heartbeat_key(router_id: &str) -> String {
    format!("router:heartbeat:{router_id}")
}

pub fn online_key(router_id: &str) -> String {
    format!("router:online:{router_id}")
}

pub fn connection_key(router_id: &str) -> String {
    format!("router:connection:{router_id}")
}

pub fn user_sessions_key(username: &str) -> String {
    format!("user:sessions:{username}")
}

pub fn rpc_channel(router_id: &str) -> String {
    format!("router:rpc:{router_id}")
}

pub fn rpc_response_channel(instance_id: &str) -> String {
    format!("router:rpc:response:{instance_id}")
}

pub fn tunnel_channel(router_id: &str) -> String {
    format!("router:x:{router_id}")
}

/// Per-session relay channel used only when a tunnel session's creating
/// instance does not also own the router's connection: the instance that
/// does own it republishes Start/Data/Error frames it can't resolve
/// locally here, keyed by session-id so either side can derive the
/// channel without a separate lookup.
pub fn tunnel_session_channel(session_id: &str) -> String {
    format!("router:x:session:{session_id}")
}
