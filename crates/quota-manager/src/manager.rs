//! Quota & reply-attribute manager (§4.6). The quota manager is the only
//! writer of the two reply attributes the core owns (§3 Ownership summary).

use crate::error::QuotaResult;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use durable_store::{queries, Database, ATTR_DATA_REMAINING, ATTR_SESSION_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use ttl_store::ConnectionRegistry;

/// `get-quota` projection (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuotaView {
    pub max_octets: i64,
    pub used_octets: i64,
    pub remaining_octets: i64,
    pub percentage_used: f64,
}

impl QuotaView {
    fn from_record(max_octets: i64, used_octets: i64) -> Self {
        let remaining_octets = (max_octets - used_octets).max(0);
        let percentage_used = if max_octets > 0 {
            (used_octets as f64 / max_octets as f64) * 100.0
        } else {
            0.0
        };
        Self {
            max_octets,
            used_octets,
            remaining_octets,
            percentage_used,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LiveUsage {
    #[serde(rename = "bytesIn")]
    bytes_in: i64,
    #[serde(rename = "bytesOut")]
    bytes_out: i64,
}

#[derive(Clone)]
pub struct QuotaManager {
    db: Database,
    registry: ConnectionRegistry,
    rpc: rpc_manager::CommandManager,
}

impl QuotaManager {
    pub fn new(db: Database, registry: ConnectionRegistry, rpc: rpc_manager::CommandManager) -> Self {
        Self { db, registry, rpc }
    }

    /// `get-quota(username) -> {max, used, remaining, percentage} | none`.
    pub async fn get_quota(&self, username: &str) -> QuotaResult<Option<QuotaView>> {
        let record = queries::active_quota(self.db.pool(), username).await?;
        Ok(record.map(|r| QuotaView::from_record(r.max_octets, r.used_octets)))
    }

    /// `create-or-update-quota(username, max-gb, type, period-days)`.
    pub async fn create_or_update_quota(
        &self,
        username: &str,
        max_gb: u64,
        quota_type: &str,
        period_days: i64,
    ) -> QuotaResult<QuotaView> {
        let period_start = Utc::now();
        let period_end = period_start + ChronoDuration::days(period_days);
        let max_octets = control_core::gb_to_octets(max_gb) as i64;
        let record = queries::create_or_update_quota(
            self.db.pool(),
            username,
            quota_type,
            max_octets,
            period_start,
            period_end,
        )
        .await?;
        Ok(QuotaView::from_record(record.max_octets, record.used_octets))
    }

    /// §4.6 `refresh-reply-attributes` — the primary enforcement write.
    pub async fn refresh_reply_attributes(&self, username: &str) -> QuotaResult<Option<QuotaView>> {
        let Some(record) = queries::active_quota(self.db.pool(), username).await? else {
            self.remove_reply_attributes(username).await?;
            return Ok(None);
        };

        let remaining = (record.max_octets - record.used_octets).max(0);
        if remaining == 0 {
            self.remove_reply_attributes(username).await?;
            return Ok(None);
        }

        let seconds_to_expiry = seconds_until(record.period_end);
        queries::upsert_reply_attribute(self.db.pool(), username, ATTR_DATA_REMAINING, &remaining.to_string())
            .await?;
        queries::upsert_reply_attribute(
            self.db.pool(),
            username,
            ATTR_SESSION_TIMEOUT,
            &seconds_to_expiry.to_string(),
        )
        .await?;

        Ok(Some(QuotaView::from_record(record.max_octets, record.used_octets)))
    }

    /// `remove-reply-attributes(username)`.
    pub async fn remove_reply_attributes(&self, username: &str) -> QuotaResult<()> {
        queries::delete_reply_attribute(self.db.pool(), username, ATTR_DATA_REMAINING).await?;
        queries::delete_reply_attribute(self.db.pool(), username, ATTR_SESSION_TIMEOUT).await?;
        Ok(())
    }

    /// §4.6 `sync-active`: reconcile the data-remaining attribute against
    /// real-time usage for the user's currently-active sessions on routers
    /// that are online right now; routers that don't answer fall back to
    /// the durable used-octets already on record.
    pub async fn sync_active(&self, username: &str) -> QuotaResult<()> {
        let Some(record) = queries::active_quota(self.db.pool(), username).await? else {
            return Ok(());
        };
        let sessions = queries::active_sessions_for_user(self.db.pool(), username).await?;

        let mut live_total: i64 = record.used_octets;
        for session in &sessions {
            if !self.registry.is_online(&session.router_id).await? {
                continue;
            }
            match self
                .rpc
                .send(
                    &session.router_id,
                    "accounting",
                    "usage",
                    serde_json::json!({ "sessionId": session.session_id }),
                    Duration::from_secs(5),
                )
                .await
            {
                Ok(value) => match serde_json::from_value::<LiveUsage>(value) {
                    Ok(usage) => {
                        let live_bytes = usage.bytes_in + usage.bytes_out;
                        if live_bytes > live_total {
                            live_total = live_bytes;
                        }
                    }
                    Err(err) => warn!(router_id = %session.router_id, %err, "malformed live-usage rpc response"),
                },
                Err(err) => {
                    debug!(router_id = %session.router_id, %err, "live-usage rpc failed, keeping durable value");
                }
            }
        }

        if live_total > record.used_octets {
            let remaining = (record.max_octets - live_total).max(0);
            queries::upsert_reply_attribute(self.db.pool(), username, ATTR_DATA_REMAINING, &remaining.to_string())
                .await?;
        }
        Ok(())
    }
}

fn seconds_until(deadline: DateTime<Utc>) -> i64 {
    (deadline - Utc::now()).num_seconds().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_view_clamps_remaining_at_zero() {
        let view = QuotaView::from_record(1000, 1500);
        assert_eq!(view.remaining_octets, 0);
    }

    #[test]
    fn quota_view_computes_percentage() {
        let view = QuotaView::from_record(1000, 250);
        assert_eq!(view.percentage_used, 25.0);
    }
}
