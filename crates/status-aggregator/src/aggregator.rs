//! `get-router-status` resolution chain (§4.11).

use crate::error::StatusResult;
use durable_store::{queries, Database, RouterStatus};
use tracing::warn;
use ttl_store::ConnectionRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterOnlineStatus {
    Online,
    Offline,
}

impl RouterOnlineStatus {
    fn as_durable(self) -> RouterStatus {
        match self {
            RouterOnlineStatus::Online => RouterStatus::Online,
            RouterOnlineStatus::Offline => RouterStatus::Offline,
        }
    }
}

#[derive(Clone)]
pub struct StatusAggregator {
    db: Database,
    registry: ConnectionRegistry,
}

impl StatusAggregator {
    pub fn new(db: Database, registry: ConnectionRegistry) -> Self {
        Self { db, registry }
    }

    /// §4.11: heartbeat store wins if present; else a registry owner still
    /// counts as online; else offline. The durable status mirror is
    /// refreshed fire-and-forget when it diverges from the derived value.
    pub async fn get_router_status(&self, router_id: &str) -> StatusResult<RouterOnlineStatus> {
        let derived = if self.registry.is_online(router_id).await? {
            RouterOnlineStatus::Online
        } else if self.registry.locate(router_id).await?.is_some() {
            RouterOnlineStatus::Online
        } else {
            RouterOnlineStatus::Offline
        };

        self.writeback_if_diverged(router_id, derived);
        Ok(derived)
    }

    fn writeback_if_diverged(&self, router_id: &str, derived: RouterOnlineStatus) {
        let db = self.db.clone();
        let router_id = router_id.to_string();
        tokio::spawn(async move {
            match queries::get_router(db.pool(), &router_id).await {
                Ok(Some(router)) if router.status != derived.as_durable() => {
                    if let Err(err) =
                        queries::set_router_status(db.pool(), &router_id, derived.as_durable()).await
                    {
                        warn!(router_id, %err, "status writeback failed");
                    }
                }
                Ok(_) => {}
                Err(err) => warn!(router_id, %err, "status writeback lookup failed"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn online_status_maps_to_durable_online() {
        assert_eq!(RouterOnlineStatus::Online.as_durable(), RouterStatus::Online);
        assert_eq!(RouterOnlineStatus::Offline.as_durable(), RouterStatus::Offline);
    }
}
