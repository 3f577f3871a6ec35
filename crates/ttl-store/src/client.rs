//! Thin client over the shared TTL store's logical interface (§6):
//! `setex`, `get`, `del`, `exists`, `incr`, `decr`, `expire`, `keys(pattern)`,
//! `publish`, plus `duplicate()` for callers (the pub/sub layer) that need
//! their own dedicated connection.
//!
//! Backed by `redis::aio::ConnectionManager`, which already reconnects
//! transparently on transport errors — the same way `falco`'s consumer
//! loop treats the underlying connection as disposable and lets the client
//! library re-establish it.

use crate::error::TtlStoreResult;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

#[derive(Clone)]
pub struct TtlStore {
    client: redis::Client,
    conn: redis::aio::ConnectionManager,
}

impl TtlStore {
    pub async fn connect(url: &str) -> TtlStoreResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { client, conn })
    }

    /// A fresh, independent connection to the same store. Used by the
    /// pub/sub subscriber and the notification listener's polling fallback
    /// so a stalled subscribe doesn't starve ordinary command traffic.
    pub async fn duplicate(&self) -> TtlStoreResult<Self> {
        let conn = self.client.get_connection_manager().await?;
        Ok(Self {
            client: self.client.clone(),
            conn,
        })
    }

    pub fn raw_client(&self) -> redis::Client {
        self.client.clone()
    }

    pub async fn setex(&self, key: &str, ttl_secs: u64, value: &str) -> TtlStoreResult<()> {
        self.conn.clone().set_ex(key, value, ttl_secs).await?;
        Ok(())
    }

    pub async fn setex_json<T: Serialize>(
        &self,
        key: &str,
        ttl_secs: u64,
        value: &T,
    ) -> TtlStoreResult<()> {
        let encoded = serde_json::to_string(value)?;
        self.setex(key, ttl_secs, &encoded).await
    }

    pub async fn get(&self, key: &str) -> TtlStoreResult<Option<String>> {
        Ok(self.conn.clone().get(key).await?)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> TtlStoreResult<Option<T>> {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn del(&self, key: &str) -> TtlStoreResult<()> {
        let _: i64 = self.conn.clone().del(key).await?;
        Ok(())
    }

    pub async fn exists(&self, key: &str) -> TtlStoreResult<bool> {
        Ok(self.conn.clone().exists(key).await?)
    }

    pub async fn incr(&self, key: &str) -> TtlStoreResult<i64> {
        Ok(self.conn.clone().incr(key, 1).await?)
    }

    pub async fn decr(&self, key: &str) -> TtlStoreResult<i64> {
        Ok(self.conn.clone().decr(key, 1).await?)
    }

    pub async fn expire(&self, key: &str, ttl_secs: u64) -> TtlStoreResult<()> {
        let _: bool = self.conn.clone().expire(key, ttl_secs as i64).await?;
        Ok(())
    }

    pub async fn keys(&self, pattern: &str) -> TtlStoreResult<Vec<String>> {
        Ok(self.conn.clone().keys(pattern).await?)
    }

    pub async fn publish(&self, channel: &str, payload: &str) -> TtlStoreResult<()> {
        let receivers: i64 = self.conn.clone().publish(channel, payload).await?;
        debug!(channel, receivers, "published to ttl store channel");
        Ok(())
    }

    pub async fn publish_json<T: Serialize>(&self, channel: &str, value: &T) -> TtlStoreResult<()> {
        let encoded = serde_json::to_string(value)?;
        self.publish(channel, &encoded).await
    }
}
