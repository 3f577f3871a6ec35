//! Per-router and fleet-sweep session reconciliation (§4.10).

use crate::error::ReconcilerResult;
use control_core::normalize_mac;
use durable_store::{queries, Database};
use quota_manager::QuotaManager;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

/// One entry from a router's live client-list RPC response.
#[derive(Debug, Deserialize)]
struct LiveClient {
    mac: String,
}

/// Outcome of reconciling one router, for the sweep's summary logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub candidates: usize,
    pub kicked: usize,
    pub kick_failures: usize,
}

#[derive(Clone)]
pub struct SessionReconciler {
    db: Database,
    rpc: rpc_manager::CommandManager,
    quota: QuotaManager,
}

impl SessionReconciler {
    pub fn new(db: Database, rpc: rpc_manager::CommandManager, quota: QuotaManager) -> Self {
        Self { db, rpc, quota }
    }

    /// Triggered on router reconnect (§4.10): reconcile this router only.
    pub async fn reconcile_router(&self, router_id: &str) -> ReconcilerResult<ReconcileOutcome> {
        let sessions = queries::active_sessions_for_router(self.db.pool(), router_id).await?;
        if sessions.is_empty() {
            return Ok(ReconcileOutcome::default());
        }

        let live_macs = self.fetch_live_macs(router_id).await;

        let mut outcome = ReconcileOutcome::default();
        for session in &sessions {
            let should_terminate = self.should_terminate(session, live_macs.as_ref()).await?;
            if !should_terminate {
                continue;
            }
            outcome.candidates += 1;

            let Some(mac) = session.mac_address.as_deref() else {
                // No MAC on record: force-close directly, nothing to kick.
                self.force_close(&session.session_id).await?;
                outcome.kicked += 1;
                continue;
            };

            match self.kick(router_id, mac).await {
                Ok(()) => {
                    self.force_close(&session.session_id).await?;
                    outcome.kicked += 1;
                }
                Err(err) => {
                    warn!(router_id, mac, %err, "kick rpc failed, session left for next sweep");
                    outcome.kick_failures += 1;
                }
            }
        }
        Ok(outcome)
    }

    /// Scheduled fleet sweep entry point (§4.10): caller is expected to
    /// stagger calls per router with 0-10s jitter; this just does the work
    /// for one router, leaving jitter/scheduling to the caller.
    pub async fn reconcile_fleet(&self) -> ReconcilerResult<Vec<(String, ReconcileOutcome)>> {
        let routers = queries::list_online_routers(self.db.pool()).await?;
        let mut results = Vec::with_capacity(routers.len());
        for router in routers {
            let jitter = Duration::from_millis(rand::random::<u64>() % 10_000);
            tokio::time::sleep(jitter).await;
            match self.reconcile_router(&router.id).await {
                Ok(outcome) => results.push((router.id, outcome)),
                Err(err) => {
                    warn!(router_id = %router.id, %err, "router reconciliation failed, continuing sweep");
                }
            }
        }
        Ok(results)
    }

    async fn fetch_live_macs(&self, router_id: &str) -> Option<HashSet<String>> {
        let response = self
            .rpc
            .send(router_id, "clients", "list", serde_json::json!({}), Duration::from_secs(10))
            .await;
        match response {
            Ok(value) => match serde_json::from_value::<Vec<LiveClient>>(value) {
                Ok(clients) => Some(clients.iter().map(|c| normalize_mac(&c.mac)).collect()),
                Err(err) => {
                    warn!(router_id, %err, "malformed live client-list response, skipping mac-absence check");
                    None
                }
            },
            Err(err) => {
                debug!(router_id, %err, "live client-list rpc failed, skipping mac-absence check");
                None
            }
        }
    }

    async fn kick(&self, router_id: &str, mac: &str) -> rpc_manager::RpcResult<()> {
        self.rpc
            .send(
                router_id,
                "clients",
                "kick",
                serde_json::json!({ "mac": mac }),
                Duration::from_secs(5),
            )
            .await
            .map(|_| ())
    }

    /// §4.10 step 4: a durable session is a termination candidate if the
    /// user should be disabled, or its MAC is absent from the router's live
    /// client set (when that set was resolvable).
    async fn should_terminate(
        &self,
        session: &durable_store::AccountingSession,
        live_macs: Option<&HashSet<String>>,
    ) -> ReconcilerResult<bool> {
        if self.user_should_be_disabled(&session.username).await? {
            return Ok(true);
        }
        if let (Some(live_macs), Some(mac)) = (live_macs, session.mac_address.as_deref()) {
            if !live_macs.contains(&normalize_mac(mac)) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn user_should_be_disabled(&self, username: &str) -> ReconcilerResult<bool> {
        if let Some(end_user) = queries::get_end_user(self.db.pool(), username).await? {
            if end_user.disabled || end_user.reject_access {
                return Ok(true);
            }
        }
        if !queries::has_active_plan(self.db.pool(), username).await? {
            return Ok(true);
        }
        if let Some(view) = self.quota.get_quota(username).await? {
            if view.remaining_octets == 0 {
                return Ok(true);
            }
        }
        if queries::has_pending_disconnect(self.db.pool(), username).await? {
            return Ok(true);
        }
        Ok(false)
    }

    async fn force_close(&self, session_id: &str) -> ReconcilerResult<()> {
        queries::close_session(self.db.pool(), session_id, "admin-reset").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconcile_outcome_defaults_to_zero() {
        let outcome = ReconcileOutcome::default();
        assert_eq!(outcome.candidates, 0);
        assert_eq!(outcome.kicked, 0);
        assert_eq!(outcome.kick_failures, 0);
    }
}
