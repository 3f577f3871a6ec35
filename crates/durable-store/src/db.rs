//! Durable store handle: a `PgPool` plus a `LISTEN`/`NOTIFY` subscription
//! factory for the three change channels in §4.9/§6.

use crate::error::DurableStoreResult;
use crate::migrations;
use sqlx::postgres::{PgListener, PgPoolOptions};
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

pub const DISCONNECT_QUEUE_CHANNEL: &str = "disconnect_queue_notify";
pub const PLAN_EXPIRY_CHANNEL: &str = "plan_expiry_notify";
pub const SESSION_COUNT_CHANNEL: &str = "session_count_change";

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect and run migrations. `max_connections` governs the shared
    /// pool every crate in the workspace borrows `Database::pool()` from.
    pub async fn connect(database_url: &str, max_connections: u32) -> DurableStoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        migrations::run_migrations(&pool).await?;
        info!(max_connections, "durable store connected and migrated");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// A dedicated `LISTEN` connection subscribed to all three change
    /// channels. The caller (the notification listener, §4.9) owns its
    /// reconnect loop; this just opens one.
    pub async fn listen_all_channels(&self) -> DurableStoreResult<PgListener> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener
            .listen_all([
                DISCONNECT_QUEUE_CHANNEL,
                PLAN_EXPIRY_CHANNEL,
                SESSION_COUNT_CHANNEL,
            ])
            .await?;
        Ok(listener)
    }

    pub async fn health_check(&self) -> DurableStoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
