//! Connection registry & heartbeat store (§4.2).
//!
//! Registry keys carry a 60s TTL, renewed every 30s while a connection is
//! open (`Router-connection fact`, §3). Heartbeat keys also carry a 60s TTL,
//! refreshed on every inbound message/pong. A router-id whose heartbeat key
//! is absent is offline regardless of registry state (§4.2 invariants).

use crate::client::TtlStore;
use crate::error::TtlStoreResult;
use crate::keys;
use serde::{Deserialize, Serialize};

/// The cluster-wide ownership record for one router connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionFact {
    #[serde(rename = "serverId")]
    pub server_id: String,
    pub timestamp: i64,
    #[serde(rename = "routerId")]
    pub router_id: String,
}

#[derive(Clone)]
pub struct ConnectionRegistry {
    store: TtlStore,
}

impl ConnectionRegistry {
    pub fn new(store: TtlStore) -> Self {
        Self { store }
    }

    /// Write the registry fact. Renewed every `ttl/2` by the caller (the
    /// inbound endpoint's connection task) while the connection stays open.
    pub async fn register(&self, router_id: &str, instance_id: &str) -> TtlStoreResult<()> {
        let fact = ConnectionFact {
            server_id: instance_id.to_string(),
            timestamp: now_ms(),
            router_id: router_id.to_string(),
        };
        self.store
            .setex_json(&keys::connection_key(router_id), keys::CONNECTION_TTL_SECS, &fact)
            .await
    }

    pub async fn unregister(&self, router_id: &str) -> TtlStoreResult<()> {
        self.store.del(&keys::connection_key(router_id)).await
    }

    pub async fn locate(&self, router_id: &str) -> TtlStoreResult<Option<String>> {
        let fact: Option<ConnectionFact> =
            self.store.get_json(&keys::connection_key(router_id)).await?;
        Ok(fact.map(|f| f.server_id))
    }

    /// True only if this process owns the live connection, i.e. the
    /// registry fact names `instance_id`.
    pub async fn is_local(&self, router_id: &str, instance_id: &str) -> TtlStoreResult<bool> {
        Ok(self.locate(router_id).await? == Some(instance_id.to_string()))
    }

    /// Refresh the heartbeat fact (§4.2). Presence of this key is the sole
    /// source of truth for liveness.
    pub async fn heartbeat(&self, router_id: &str) -> TtlStoreResult<()> {
        self.store
            .setex(&keys::heartbeat_key(router_id), keys::HEARTBEAT_TTL_SECS, "1")
            .await
    }

    pub async fn is_online(&self, router_id: &str) -> TtlStoreResult<bool> {
        self.store.exists(&keys::heartbeat_key(router_id)).await
    }

    /// `router:online:<id>` is a secondary, longer-lived breadcrumb some
    /// external collaborators (e.g. the admin API) read directly; kept in
    /// step with the heartbeat fact by the status aggregator's writeback,
    /// not written here.
    pub async fn is_online_breadcrumb(&self, router_id: &str) -> TtlStoreResult<bool> {
        self.store.exists(&keys::online_key(router_id)).await
    }

    pub fn store(&self) -> &TtlStore {
        &self.store
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Per-user active-session counter (§4.9 session-count-events). Backed by
/// `user:sessions:<username>`, TTL 86400s.
#[derive(Clone)]
pub struct SessionCounters {
    store: TtlStore,
}

impl SessionCounters {
    pub fn new(store: TtlStore) -> Self {
        Self { store }
    }

    pub async fn increment(&self, username: &str) -> TtlStoreResult<i64> {
        let key = keys::user_sessions_key(username);
        let value = self.store.incr(&key).await?;
        self.store.expire(&key, keys::USER_SESSIONS_TTL_SECS).await?;
        Ok(value)
    }

    /// Returns the post-decrement value. A caller that observes a negative
    /// value (sessions went out of sync with ttl-store tracking) should
    /// recompute from the durable accounting store and reset with
    /// [`SessionCounters::set`].
    pub async fn decrement(&self, username: &str) -> TtlStoreResult<i64> {
        let key = keys::user_sessions_key(username);
        let value = self.store.decr(&key).await?;
        self.store.expire(&key, keys::USER_SESSIONS_TTL_SECS).await?;
        Ok(value)
    }

    pub async fn set(&self, username: &str, value: i64) -> TtlStoreResult<()> {
        self.store
            .setex(
                &keys::user_sessions_key(username),
                keys::USER_SESSIONS_TTL_SECS,
                &value.to_string(),
            )
            .await
    }

    pub async fn get(&self, username: &str) -> TtlStoreResult<i64> {
        Ok(self
            .store
            .get(&keys::user_sessions_key(username))
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0))
    }
}
