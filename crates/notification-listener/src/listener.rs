//! Change-notification dispatch loop (§4.9).

use crate::error::NotificationResult;
use durable_store::{
    queries, Database, SessionCountAction, SessionCountEvent, DISCONNECT_QUEUE_CHANNEL,
    PLAN_EXPIRY_CHANNEL, SESSION_COUNT_CHANNEL,
};
use quota_manager::QuotaManager;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use ttl_store::SessionCounters;

const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct NotificationListener {
    db: Database,
    counters: SessionCounters,
    quota: QuotaManager,
    disconnect_signal: mpsc::Sender<()>,
}

impl NotificationListener {
    pub fn new(
        db: Database,
        counters: SessionCounters,
        quota: QuotaManager,
        disconnect_signal: mpsc::Sender<()>,
    ) -> Self {
        Self {
            db,
            counters,
            quota,
            disconnect_signal,
        }
    }

    /// Runs until the process shuts down. On subscription drop, reconnects
    /// with a fixed 5s backoff and resubscribes; while disconnected, the
    /// disconnect worker and quota manager's own polling fallbacks keep
    /// correctness.
    pub async fn run(&self) {
        loop {
            match self.db.listen_all_channels().await {
                Ok(mut listener) => {
                    debug!("notification listener subscribed");
                    loop {
                        match listener.recv().await {
                            Ok(notification) => {
                                self.dispatch(notification.channel(), notification.payload()).await;
                            }
                            Err(err) => {
                                warn!(%err, "notification listener connection lost, reconnecting");
                                break;
                            }
                        }
                    }
                }
                Err(err) => {
                    warn!(%err, "failed to subscribe to change channels, retrying");
                }
            }
            tokio::time::sleep(RECONNECT_BACKOFF).await;
        }
    }

    async fn dispatch(&self, channel: &str, payload: &str) {
        let result = match channel {
            DISCONNECT_QUEUE_CHANNEL => {
                let _ = self.disconnect_signal.send(()).await;
                Ok(())
            }
            PLAN_EXPIRY_CHANNEL => self.handle_plan_expiry(payload).await,
            SESSION_COUNT_CHANNEL => self.handle_session_count(payload).await,
            other => {
                debug!(channel = other, "ignoring notification on unrecognized channel");
                Ok(())
            }
        };
        if let Err(err) = result {
            warn!(channel, %err, "failed to handle change notification");
        }
    }

    /// Recompute the affected user's reply attributes, then disable any
    /// user left without an active plan (§4.9).
    async fn handle_plan_expiry(&self, username: &str) -> NotificationResult<()> {
        self.quota.refresh_reply_attributes(username).await?;
        if !queries::has_active_plan(self.db.pool(), username).await? {
            queries::set_end_user_disabled(self.db.pool(), username, true).await?;
        }
        Ok(())
    }

    async fn handle_session_count(&self, payload: &str) -> NotificationResult<()> {
        let event: SessionCountEvent = match serde_json::from_str(payload) {
            Ok(event) => event,
            Err(err) => {
                warn!(%err, payload, "malformed session-count-change payload");
                return Ok(());
            }
        };
        match event.action {
            SessionCountAction::Start => {
                self.counters.increment(&event.username).await?;
            }
            SessionCountAction::Stop => {
                let remaining = self.counters.decrement(&event.username).await?;
                if remaining < 0 {
                    self.recompute_session_count(&event.username).await?;
                }
            }
        }
        Ok(())
    }

    async fn recompute_session_count(&self, username: &str) -> NotificationResult<()> {
        let sessions = queries::active_sessions_for_user(self.db.pool(), username).await?;
        self.counters.set(username, sessions.len() as i64).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_all_three_spec_channels() {
        assert_eq!(DISCONNECT_QUEUE_CHANNEL, "disconnect_queue_notify");
        assert_eq!(PLAN_EXPIRY_CHANNEL, "plan_expiry_notify");
        assert_eq!(SESSION_COUNT_CHANNEL, "session_count_change");
    }
}
