//! Query helpers, one function per operation named in §4 of SPEC_FULL.md.
//! Plain `sqlx::query`/`query_as` (no compile-time `query!` macro) so the
//! crate builds without a live database reachable at compile time.

use crate::error::{DurableStoreError, DurableStoreResult};
use crate::models::*;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

// ---------------------------------------------------------------- routers

pub async fn get_router(pool: &PgPool, router_id: &str) -> DurableStoreResult<Option<Router>> {
    Ok(sqlx::query_as::<_, Router>("SELECT * FROM routers WHERE id = $1")
        .bind(router_id)
        .fetch_optional(pool)
        .await?)
}

/// Look up a router by its last-known address, for inbound DAE packets that
/// carry a NAS-IP-Address instead of a NAS-Identifier (§4.8).
pub async fn get_router_by_address(pool: &PgPool, address: &str) -> DurableStoreResult<Option<Router>> {
    Ok(sqlx::query_as::<_, Router>("SELECT * FROM routers WHERE address = $1")
        .bind(address)
        .fetch_optional(pool)
        .await?)
}

/// Atomic IP-rebind + secret synthesis (§4.1): update address and/or
/// radius_secret in one statement so a mid-update failure can't leave the
/// row half-migrated.
pub async fn update_router_connection_state(
    pool: &PgPool,
    router_id: &str,
    address: Option<&str>,
    radius_secret: Option<&str>,
) -> DurableStoreResult<Router> {
    let row = sqlx::query_as::<_, Router>(
        r#"
        UPDATE routers
        SET address = COALESCE($2, address),
            radius_secret = COALESCE($3, radius_secret),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(router_id)
    .bind(address)
    .bind(radius_secret)
    .fetch_optional(pool)
    .await?;
    row.ok_or_else(|| DurableStoreError::NotFound(format!("router {router_id}")))
}

pub async fn touch_router_last_seen(
    pool: &PgPool,
    router_id: &str,
    status: RouterStatus,
) -> DurableStoreResult<()> {
    sqlx::query(
        "UPDATE routers SET last_seen = now(), status = $2, updated_at = now() WHERE id = $1",
    )
    .bind(router_id)
    .bind(status)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_router_name(
    pool: &PgPool,
    router_id: &str,
    name: &str,
) -> DurableStoreResult<()> {
    sqlx::query("UPDATE routers SET name = $2, updated_at = now() WHERE id = $1")
        .bind(router_id)
        .bind(name)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_router_status(
    pool: &PgPool,
    router_id: &str,
    status: RouterStatus,
) -> DurableStoreResult<()> {
    sqlx::query("UPDATE routers SET status = $2, updated_at = now() WHERE id = $1")
        .bind(router_id)
        .bind(status)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_online_routers(pool: &PgPool) -> DurableStoreResult<Vec<Router>> {
    Ok(
        sqlx::query_as::<_, Router>("SELECT * FROM routers WHERE status = 'online'")
            .fetch_all(pool)
            .await?,
    )
}

// ----------------------------------------------------- accounting sessions

pub async fn active_sessions_for_user(
    pool: &PgPool,
    username: &str,
) -> DurableStoreResult<Vec<AccountingSession>> {
    Ok(sqlx::query_as::<_, AccountingSession>(
        "SELECT * FROM accounting_sessions WHERE username = $1 AND stop_time IS NULL",
    )
    .bind(username)
    .fetch_all(pool)
    .await?)
}

pub async fn active_sessions_for_router(
    pool: &PgPool,
    router_id: &str,
) -> DurableStoreResult<Vec<AccountingSession>> {
    Ok(sqlx::query_as::<_, AccountingSession>(
        "SELECT * FROM accounting_sessions WHERE router_id = $1 AND stop_time IS NULL",
    )
    .bind(router_id)
    .fetch_all(pool)
    .await?)
}

/// Force-close a session with an explicit terminate cause (§3: the only
/// mutation the reconciler/DAE server may make to accounting sessions).
pub async fn close_session(
    pool: &PgPool,
    session_id: &str,
    terminate_cause: &str,
) -> DurableStoreResult<bool> {
    let result = sqlx::query(
        "UPDATE accounting_sessions SET stop_time = now(), terminate_cause = $2 WHERE session_id = $1 AND stop_time IS NULL",
    )
    .bind(session_id)
    .bind(terminate_cause)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Find a single active session matching `(username, session_id?)`, as the
/// DAE server's Disconnect-Request handler needs (§4.8).
pub async fn find_active_session(
    pool: &PgPool,
    username: &str,
    session_id: Option<&str>,
) -> DurableStoreResult<Option<AccountingSession>> {
    Ok(sqlx::query_as::<_, AccountingSession>(
        r#"
        SELECT * FROM accounting_sessions
        WHERE username = $1 AND stop_time IS NULL
          AND ($2::text IS NULL OR session_id = $2)
        ORDER BY start_time DESC
        LIMIT 1
        "#,
    )
    .bind(username)
    .bind(session_id)
    .fetch_optional(pool)
    .await?)
}

// -------------------------------------------------------------- quotas

/// Active quota record for `username`, per the tie-break rule in §4.6:
/// `period_start <= now < period_end`, ties broken by largest `period_end`.
pub async fn active_quota(pool: &PgPool, username: &str) -> DurableStoreResult<Option<QuotaRecord>> {
    Ok(sqlx::query_as::<_, QuotaRecord>(
        r#"
        SELECT * FROM quotas
        WHERE username = $1 AND period_start <= now() AND now() < period_end
        ORDER BY period_end DESC
        LIMIT 1
        "#,
    )
    .bind(username)
    .fetch_optional(pool)
    .await?)
}

/// §3/§8: a true upsert keyed on the `uq_quotas_username_type` unique index.
/// A fresh `(username, quota_type)` inserts `used_octets = 0`; renewing an
/// existing one updates the window and cap but leaves `used_octets` alone
/// (it is written only by durable-store triggers, never by this call, per
/// §5 "Shared mutation") and resets `expiry_enqueued` so the new period's
/// own expiry gets enqueued in turn.
pub async fn create_or_update_quota(
    pool: &PgPool,
    username: &str,
    quota_type: &str,
    max_octets: i64,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
) -> DurableStoreResult<QuotaRecord> {
    let row = sqlx::query_as::<_, QuotaRecord>(
        r#"
        INSERT INTO quotas (username, quota_type, period_start, period_end, max_octets, used_octets)
        VALUES ($1, $2, $3, $4, $5, 0)
        ON CONFLICT (username, quota_type) DO UPDATE
        SET period_start = EXCLUDED.period_start,
            period_end = EXCLUDED.period_end,
            max_octets = EXCLUDED.max_octets,
            expiry_enqueued = false
        RETURNING *
        "#,
    )
    .bind(username)
    .bind(quota_type)
    .bind(period_start)
    .bind(period_end)
    .bind(max_octets)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// §4.7 bullet 2 / §8 scenario 2: "a quota record's `period-end` equals
/// `now`. The periodic expiry function inserts a disconnect-queue row with
/// reason `plan-expired`." Flags each quota whose window has closed and
/// hasn't been flagged yet, and enqueues one disconnect per username in the
/// same statement so a crash between the two can't drop or duplicate a row.
pub async fn enqueue_expired_quota_disconnects(pool: &PgPool) -> DurableStoreResult<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        WITH due AS (
            UPDATE quotas
            SET expiry_enqueued = true
            WHERE period_end <= now() AND NOT expiry_enqueued
            RETURNING username
        )
        INSERT INTO disconnect_queue (job_key, username, reason)
        SELECT '', username, 'plan-expired' FROM due
        RETURNING username
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(u,)| u).collect())
}

// ---------------------------------------------------------- reply attributes

pub async fn upsert_reply_attribute(
    pool: &PgPool,
    username: &str,
    attribute_name: &str,
    value: &str,
) -> DurableStoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO reply_attributes (username, attribute_name, op, value)
        VALUES ($1, $2, ':=', $3)
        ON CONFLICT (username, attribute_name) DO UPDATE SET value = EXCLUDED.value
        "#,
    )
    .bind(username)
    .bind(attribute_name)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_reply_attribute(
    pool: &PgPool,
    username: &str,
    attribute_name: &str,
) -> DurableStoreResult<()> {
    sqlx::query("DELETE FROM reply_attributes WHERE username = $1 AND attribute_name = $2")
        .bind(username)
        .bind(attribute_name)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get_reply_attributes(
    pool: &PgPool,
    username: &str,
) -> DurableStoreResult<Vec<ReplyAttribute>> {
    Ok(
        sqlx::query_as::<_, ReplyAttribute>("SELECT * FROM reply_attributes WHERE username = $1")
            .bind(username)
            .fetch_all(pool)
            .await?,
    )
}

// -------------------------------------------------------------- disconnect queue

pub async fn select_unprocessed_disconnects(
    pool: &PgPool,
    batch_size: i64,
) -> DurableStoreResult<Vec<DisconnectQueueItem>> {
    Ok(sqlx::query_as::<_, DisconnectQueueItem>(
        r#"
        SELECT * FROM disconnect_queue
        WHERE processed = false
        ORDER BY created_at ASC
        LIMIT $1
        "#,
    )
    .bind(batch_size)
    .fetch_all(pool)
    .await?)
}

pub async fn enqueue_admin_disconnect(
    pool: &PgPool,
    username: &str,
) -> DurableStoreResult<DisconnectQueueItem> {
    Ok(sqlx::query_as::<_, DisconnectQueueItem>(
        "INSERT INTO disconnect_queue (job_key, username, reason) VALUES ('', $1, 'admin') RETURNING *",
    )
    .bind(username)
    .fetch_one(pool)
    .await?)
}

pub async fn mark_disconnect_processed(pool: &PgPool, id: i64) -> DurableStoreResult<()> {
    sqlx::query("UPDATE disconnect_queue SET processed = true WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Whether `username` has an unprocessed disconnect-queue entry (§4.10 step
/// 4: "pending disconnect" is one of the should-be-disabled conditions).
pub async fn has_pending_disconnect(pool: &PgPool, username: &str) -> DurableStoreResult<bool> {
    let row: (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM disconnect_queue WHERE username = $1 AND processed = false)",
    )
    .bind(username)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

pub async fn record_disconnect_retry(
    pool: &PgPool,
    id: i64,
    failed: bool,
) -> DurableStoreResult<i32> {
    let row: (i32,) = sqlx::query_as(
        "UPDATE disconnect_queue SET retry_count = retry_count + 1, failed = $2 WHERE id = $1 RETURNING retry_count",
    )
    .bind(id)
    .bind(failed)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

// -------------------------------------------------------------- end users / plans

pub async fn get_end_user(pool: &PgPool, username: &str) -> DurableStoreResult<Option<EndUser>> {
    Ok(
        sqlx::query_as::<_, EndUser>("SELECT * FROM end_users WHERE username = $1")
            .bind(username)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn set_end_user_disabled(
    pool: &PgPool,
    username: &str,
    disabled: bool,
) -> DurableStoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO end_users (username, disabled) VALUES ($1, $2)
        ON CONFLICT (username) DO UPDATE SET disabled = EXCLUDED.disabled
        "#,
    )
    .bind(username)
    .bind(disabled)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn has_active_plan(pool: &PgPool, username: &str) -> DurableStoreResult<bool> {
    let row: (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM user_plans
            WHERE username = $1 AND status = 'active' AND starts_at <= now() AND now() < ends_at
        )
        "#,
    )
    .bind(username)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

/// Flip any plan whose `ends_at` has passed to `expired` (§4.9's
/// "plan-expiry handler"). Returns the usernames whose plans just expired,
/// so the caller can drive the disable-without-active-plan follow-up.
pub async fn expire_due_plans(pool: &PgPool) -> DurableStoreResult<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        UPDATE user_plans
        SET status = 'expired'
        WHERE status = 'active' AND ends_at <= now()
        RETURNING username
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(u,)| u).collect())
}

#[cfg(test)]
mod tests {
    // Query helpers are exercised against a live Postgres instance in
    // integration tests (not run here, since this workspace is never built
    // against a real database in CI for this exercise); these unit tests
    // only cover the pure helpers that don't need a pool.
    #[test]
    fn attribute_names_match_spec_section_3() {
        assert_eq!(super::super::models::ATTR_DATA_REMAINING, "Mikrotik-Total-Limit");
        assert_eq!(super::super::models::ATTR_SESSION_TIMEOUT, "Session-Timeout");
    }
}
