//! Disconnect queue worker (§4.7): drains the durable queue on a
//! notification signal, falling back to polling, and dispatches
//! CoA-Disconnect per active session.

use crate::config::WorkerConfig;
use crate::job;
use chrono::{DateTime, Utc};
use coa_client::{CoaClient, DisconnectRequest, NasIdentity};
use dashmap::DashMap;
use durable_store::{queries, Database, DisconnectQueueItem};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use ttl_store::ConnectionRegistry;

/// RADIUS DAE/CoA port (RFC 5176).
const COA_PORT: u16 = 3799;

#[derive(Clone)]
pub struct DisconnectWorker {
    db: Database,
    registry: ConnectionRegistry,
    coa: CoaClient,
    config: WorkerConfig,
    last_attempt: Arc<DashMap<String, DateTime<Utc>>>,
}

impl DisconnectWorker {
    pub fn new(db: Database, registry: ConnectionRegistry, coa: CoaClient, config: WorkerConfig) -> Self {
        Self {
            db,
            registry,
            coa,
            config,
            last_attempt: Arc::new(DashMap::new()),
        }
    }

    /// §4.7: `tokio::select!` between the change-notification signal and a
    /// 10s polling fallback ticker, draining a batch on either.
    pub async fn run(&self, mut notify_rx: mpsc::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        loop {
            tokio::select! {
                signal = notify_rx.recv() => {
                    match signal {
                        Some(()) => self.process_batch().await,
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    self.process_batch().await;
                }
            }
        }
    }

    async fn process_batch(&self) {
        let items = match queries::select_unprocessed_disconnects(self.db.pool(), self.config.batch_size).await {
            Ok(items) => items,
            Err(err) => {
                error!(%err, "failed to select unprocessed disconnect queue items");
                return;
            }
        };
        let now = Utc::now();
        for item in items {
            let key = job::job_key(&item.username, item.id);
            if item.failed && item.retry_count >= self.config.max_retries {
                continue;
            }
            let last_attempt = self.last_attempt.get(&key).map(|entry| *entry.value());
            if !job::is_due(item.retry_count, last_attempt, now, &self.config) {
                continue;
            }
            self.last_attempt.insert(key.clone(), now);
            self.process_job(item, &key).await;
        }
    }

    /// §4.7 processing algorithm: resolve the user's active sessions,
    /// address each one's router (disconnect if online, defer to the
    /// reconciler if offline), and mark processed only once every router
    /// has been addressed or declared offline.
    async fn process_job(&self, item: DisconnectQueueItem, key: &str) {
        let sessions = match queries::active_sessions_for_user(self.db.pool(), &item.username).await {
            Ok(sessions) => sessions,
            Err(err) => {
                warn!(job_key = key, %err, "failed to load active sessions for disconnect job");
                return;
            }
        };

        if sessions.is_empty() {
            self.finish(item.id, key, true).await;
            return;
        }

        let mut all_addressed = true;
        for session in &sessions {
            let router = match queries::get_router(self.db.pool(), &session.router_id).await {
                Ok(Some(router)) => router,
                Ok(None) => {
                    warn!(job_key = key, router_id = %session.router_id, "router not found, deferring to reconciler");
                    all_addressed = false;
                    continue;
                }
                Err(err) => {
                    warn!(job_key = key, %err, "failed to load router for disconnect job");
                    all_addressed = false;
                    continue;
                }
            };

            let online = self.registry.is_online(&router.id).await.unwrap_or(false);
            if !online {
                // Offline routers are declared addressed; the reconciler
                // force-closes on reconnect if the session is still live.
                continue;
            }

            let Some(secret) = router.radius_secret.as_deref() else {
                warn!(job_key = key, router_id = %router.id, "router has no radius secret yet, deferring");
                all_addressed = false;
                continue;
            };
            let Some(address) = router.address.as_deref() else {
                warn!(job_key = key, router_id = %router.id, "router has no known address, deferring");
                all_addressed = false;
                continue;
            };
            let nas_addr: SocketAddr = match format!("{address}:{COA_PORT}").parse() {
                Ok(addr) => addr,
                Err(err) => {
                    warn!(job_key = key, %err, "router address unparseable, deferring");
                    all_addressed = false;
                    continue;
                }
            };

            let request = DisconnectRequest {
                user_name: item.username.clone(),
                nas: NasIdentity::by_identifier(router.id.clone()),
                acct_session_id: Some(session.session_id.clone()),
                calling_station_id: session.calling_station_id.clone(),
                framed_ip_address: None,
                called_station_id: None,
            };

            match self.coa.send_disconnect(nas_addr, secret.as_bytes(), &request).await {
                Ok(outcome) if outcome.success => {
                    debug!(job_key = key, router_id = %router.id, "coa-disconnect acked");
                }
                Ok(outcome) => {
                    warn!(job_key = key, router_id = %router.id, code = outcome.response_code, "coa-disconnect nak");
                    all_addressed = false;
                }
                Err(err) => {
                    warn!(job_key = key, router_id = %router.id, %err, "coa-disconnect failed");
                    all_addressed = false;
                }
            }
        }

        self.finish(item.id, key, all_addressed).await;
    }

    async fn finish(&self, id: i64, key: &str, all_addressed: bool) {
        if all_addressed {
            if let Err(err) = queries::mark_disconnect_processed(self.db.pool(), id).await {
                error!(job_key = key, %err, "failed to mark disconnect queue item processed");
                return;
            }
            self.last_attempt.remove(key);
            return;
        }

        let retry_count = match queries::record_disconnect_retry(self.db.pool(), id, false).await {
            Ok(count) => count,
            Err(err) => {
                error!(job_key = key, %err, "failed to record disconnect retry");
                return;
            }
        };
        if retry_count >= self.config.max_retries {
            if let Err(err) = queries::record_disconnect_retry(self.db.pool(), id, true).await {
                error!(job_key = key, %err, "failed to mark disconnect job failed after max retries");
            }
        }
    }
}
