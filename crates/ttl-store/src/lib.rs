//! Shared TTL store client (§4.2, §6): the logical `setex`/`get`/`del`/
//! `incr`/`expire`/`publish`/`subscribe` interface, the connection-registry
//! and heartbeat facts built on top of it, and the per-user session
//! counters used by the change-notification listener.

mod client;
mod error;
mod keys;
mod registry;
mod subscriber;

pub use client::TtlStore;
pub use error::{TtlStoreError, TtlStoreResult};
pub use keys::{
    connection_key, heartbeat_key, online_key, rpc_channel, rpc_response_channel, tunnel_channel,
    tunnel_session_channel, user_sessions_key, CONNECTION_RENEW_SECS, CONNECTION_TTL_SECS,
    HEARTBEAT_TTL_SECS, USER_SESSIONS_TTL_SECS,
};
pub use registry::{ConnectionFact, ConnectionRegistry, SessionCounters};
pub use subscriber::{spawn_pattern_subscriber, PatternMessage};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_conventions_match_spec_section_6() {
        assert_eq!(heartbeat_key("r1"), "router:heartbeat:r1");
        assert_eq!(online_key("r1"), "router:online:r1");
        assert_eq!(connection_key("r1"), "router:connection:r1");
        assert_eq!(user_sessions_key("alice"), "user:sessions:alice");
        assert_eq!(rpc_channel("r1"), "router:rpc:r1");
        assert_eq!(rpc_response_channel("inst-a"), "router:rpc:response:inst-a");
        assert_eq!(tunnel_channel("r1"), "router:x:r1");
        assert_eq!(tunnel_session_channel("s1"), "router:x:session:s1");
    }

    #[test]
    fn connection_ttl_renews_at_half_life() {
        assert_eq!(CONNECTION_TTL_SECS, 60);
        assert_eq!(CONNECTION_RENEW_SECS, 30);
    }
}
