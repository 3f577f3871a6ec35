//! Durable-store row types (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered edge router. Created externally (admin action); mutated
/// only by the inbound endpoint and the status aggregator; never deleted
/// by the core.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Router {
    pub id: String,
    pub token: String,
    pub address: Option<String>,
    pub name: String,
    pub radius_secret: Option<String>,
    pub status: RouterStatus,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RouterStatus {
    Online,
    Offline,
}

impl RouterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouterStatus::Online => "online",
            RouterStatus::Offline => "offline",
        }
    }
}

/// An accounting session read from the RADIUS accounting store. Read-only
/// to the core except the reconciler, which may set `stop_time` with cause
/// `"admin-reset"` (§3).
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct AccountingSession {
    pub session_id: String,
    pub username: String,
    pub router_id: String,
    pub nas_ip: Option<String>,
    pub calling_station_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub stop_time: Option<DateTime<Utc>>,
    pub input_octets: i64,
    pub output_octets: i64,
    pub terminate_cause: Option<String>,
    /// MAC address of the client, reported by accounting (Calling-Station-Id
    /// normalized). Used by the reconciler to match against the router's
    /// live client list.
    pub mac_address: Option<String>,
}

/// One (username, quota-type) quota record (§3).
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct QuotaRecord {
    pub id: uuid::Uuid,
    pub username: String,
    pub quota_type: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub max_octets: i64,
    pub used_octets: i64,
    /// Set once a period-end-reached disconnect has been enqueued for this
    /// row, so the periodic expiry sweep doesn't re-enqueue it every tick
    /// (§4.7 bullet 2, §8 scenario 2).
    pub expiry_enqueued: bool,
}

/// A RADIUS reply attribute row. The core only ever writes the two it owns
/// (`data-remaining`, `session-timeout`); other attributes are external
/// collaborators' responsibility but are readable here too.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ReplyAttribute {
    pub username: String,
    pub attribute_name: String,
    pub op: String,
    pub value: String,
}

/// Name of the data-remaining reply attribute the quota manager owns.
pub const ATTR_DATA_REMAINING: &str = "Mikrotik-Total-Limit";
/// Name of the session-timeout reply attribute the quota manager owns.
pub const ATTR_SESSION_TIMEOUT: &str = "Session-Timeout";

/// A durable disconnect-queue item (§3, §4.7). `processed` transitions
/// exactly once; items survive process restarts.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct DisconnectQueueItem {
    pub id: i64,
    pub job_key: String,
    pub username: String,
    pub reason: DisconnectReason,
    pub created_at: DateTime<Utc>,
    pub processed: bool,
    pub retry_count: i32,
    pub failed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "text", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum DisconnectReason {
    QuotaExceeded,
    PlanExpired,
    Admin,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::QuotaExceeded => "quota-exceeded",
            DisconnectReason::PlanExpired => "plan-expired",
            DisconnectReason::Admin => "admin",
        }
    }
}

/// An end-user account, as tracked outside of RADIUS auth itself. Used by
/// the reconciler to decide whether a user "should be disabled" (§4.10).
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct EndUser {
    pub username: String,
    pub disabled: bool,
    pub reject_access: bool,
}

/// A user's subscription plan window.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct UserPlan {
    pub id: uuid::Uuid,
    pub username: String,
    pub plan_name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: PlanStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Active,
    Expired,
}

/// Payload of a `session_count_change` notification (§4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCountEvent {
    pub username: String,
    pub action: SessionCountAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionCountAction {
    Start,
    Stop,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnect_reason_round_trips_wire_string() {
        assert_eq!(DisconnectReason::QuotaExceeded.as_str(), "quota-exceeded");
        assert_eq!(DisconnectReason::PlanExpired.as_str(), "plan-expired");
        assert_eq!(DisconnectReason::Admin.as_str(), "admin");
    }

    #[test]
    fn router_status_as_str() {
        assert_eq!(RouterStatus::Online.as_str(), "online");
        assert_eq!(RouterStatus::Offline.as_str(), "offline");
    }
}
