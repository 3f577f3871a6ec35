//! Schema migrations for the durable store.
//!
//! Runs as a fixed, idempotent sequence of `CREATE TABLE IF NOT EXISTS` /
//! `CREATE OR REPLACE FUNCTION` statements against a `PgPool` at startup,
//! the same "run migrations on pool open" shape the teacher used for its
//! embedded SQLite store, adapted to Postgres DDL plus the `LISTEN`/`NOTIFY`
//! triggers the change-notification channels (§4.9, §6) depend on.

use crate::error::DurableStoreResult;
use sqlx::PgPool;
use tracing::info;

const STATEMENTS: &[&str] = &[
    "CREATE EXTENSION IF NOT EXISTS pgcrypto",
    r#"
    CREATE TABLE IF NOT EXISTS routers (
        id TEXT PRIMARY KEY,
        token TEXT NOT NULL,
        address TEXT,
        name TEXT NOT NULL,
        radius_secret TEXT,
        status TEXT NOT NULL DEFAULT 'offline',
        last_seen TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS accounting_sessions (
        session_id TEXT PRIMARY KEY,
        username TEXT NOT NULL,
        router_id TEXT NOT NULL,
        nas_ip TEXT,
        calling_station_id TEXT,
        mac_address TEXT,
        start_time TIMESTAMPTZ NOT NULL DEFAULT now(),
        stop_time TIMESTAMPTZ,
        input_octets BIGINT NOT NULL DEFAULT 0,
        output_octets BIGINT NOT NULL DEFAULT 0,
        terminate_cause TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_accounting_active_by_router ON accounting_sessions (router_id) WHERE stop_time IS NULL",
    "CREATE INDEX IF NOT EXISTS idx_accounting_active_by_user ON accounting_sessions (username) WHERE stop_time IS NULL",
    r#"
    CREATE TABLE IF NOT EXISTS quotas (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        username TEXT NOT NULL,
        quota_type TEXT NOT NULL,
        period_start TIMESTAMPTZ NOT NULL,
        period_end TIMESTAMPTZ NOT NULL,
        max_octets BIGINT NOT NULL,
        used_octets BIGINT NOT NULL DEFAULT 0,
        expiry_enqueued BOOLEAN NOT NULL DEFAULT false
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_quotas_username_period ON quotas (username, period_start, period_end)",
    // §3: "at most one active record per (username, quota-type)". One row
    // per (username, quota-type) that `create_or_update_quota` renews in
    // place, rather than a new row per period, is what makes that invariant
    // enforceable with a plain unique index instead of a range-exclusion
    // constraint.
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_quotas_username_type ON quotas (username, quota_type)",
    "CREATE INDEX IF NOT EXISTS idx_quotas_expiry_due ON quotas (period_end) WHERE NOT expiry_enqueued",
    // A quota crossing its max enqueues a disconnect (§4.7, bullet 1).
    r#"
    CREATE OR REPLACE FUNCTION enqueue_disconnect_on_quota_exceeded() RETURNS trigger AS $$
    BEGIN
        IF NEW.used_octets >= NEW.max_octets
           AND (TG_OP = 'INSERT' OR OLD.used_octets < OLD.max_octets) THEN
            INSERT INTO disconnect_queue (job_key, username, reason)
            VALUES ('', NEW.username, 'quota-exceeded');
        END IF;
        RETURN NEW;
    END;
    $$ LANGUAGE plpgsql
    "#,
    "DROP TRIGGER IF EXISTS trg_enqueue_disconnect_on_quota_exceeded ON quotas",
    r#"
    CREATE TRIGGER trg_enqueue_disconnect_on_quota_exceeded
    AFTER INSERT OR UPDATE ON quotas
    FOR EACH ROW EXECUTE FUNCTION enqueue_disconnect_on_quota_exceeded()
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reply_attributes (
        username TEXT NOT NULL,
        attribute_name TEXT NOT NULL,
        op TEXT NOT NULL DEFAULT ':=',
        value TEXT NOT NULL,
        PRIMARY KEY (username, attribute_name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS check_attributes (
        username TEXT NOT NULL,
        attribute_name TEXT NOT NULL,
        op TEXT NOT NULL DEFAULT ':=',
        value TEXT NOT NULL,
        PRIMARY KEY (username, attribute_name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS disconnect_queue (
        id BIGSERIAL PRIMARY KEY,
        job_key TEXT NOT NULL,
        username TEXT NOT NULL,
        reason TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        processed BOOLEAN NOT NULL DEFAULT false,
        retry_count INT NOT NULL DEFAULT 0,
        failed BOOLEAN NOT NULL DEFAULT false
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_disconnect_queue_unprocessed ON disconnect_queue (created_at) WHERE processed = false",
    // job_key is `disconnect-<username>-<id>` (§4.7): the row's own id is
    // assigned from its sequence before a BEFORE INSERT trigger runs, so it
    // can be read back here. Two notifications (NOTIFY + poll) for the same
    // row always carry the same key; the worker's in-flight set collapses
    // them to one job.
    r#"
    CREATE OR REPLACE FUNCTION set_disconnect_job_key() RETURNS trigger AS $$
    BEGIN
        NEW.job_key := 'disconnect-' || NEW.username || '-' || NEW.id;
        RETURN NEW;
    END;
    $$ LANGUAGE plpgsql
    "#,
    "DROP TRIGGER IF EXISTS trg_set_disconnect_job_key ON disconnect_queue",
    r#"
    CREATE TRIGGER trg_set_disconnect_job_key
    BEFORE INSERT ON disconnect_queue
    FOR EACH ROW EXECUTE FUNCTION set_disconnect_job_key()
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS end_users (
        username TEXT PRIMARY KEY,
        disabled BOOLEAN NOT NULL DEFAULT false,
        reject_access BOOLEAN NOT NULL DEFAULT false
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_plans (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        username TEXT NOT NULL,
        plan_name TEXT NOT NULL,
        starts_at TIMESTAMPTZ NOT NULL,
        ends_at TIMESTAMPTZ NOT NULL,
        status TEXT NOT NULL DEFAULT 'active'
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_user_plans_username ON user_plans (username, status)",
    // A plan flipping to expired enqueues a disconnect (§4.7, bullet 2).
    r#"
    CREATE OR REPLACE FUNCTION enqueue_disconnect_on_plan_expiry() RETURNS trigger AS $$
    BEGIN
        IF NEW.status = 'expired' AND (OLD.status IS NULL OR OLD.status <> 'expired') THEN
            INSERT INTO disconnect_queue (job_key, username, reason)
            VALUES ('', NEW.username, 'plan-expired');
        END IF;
        RETURN NEW;
    END;
    $$ LANGUAGE plpgsql
    "#,
    "DROP TRIGGER IF EXISTS trg_enqueue_disconnect_on_plan_expiry ON user_plans",
    r#"
    CREATE TRIGGER trg_enqueue_disconnect_on_plan_expiry
    AFTER INSERT OR UPDATE ON user_plans
    FOR EACH ROW EXECUTE FUNCTION enqueue_disconnect_on_plan_expiry()
    "#,
    // disconnect_queue_notify (§4.9): fired on every insert so the worker's
    // event-driven path wakes up without waiting for the 10s poll.
    r#"
    CREATE OR REPLACE FUNCTION notify_disconnect_queue() RETURNS trigger AS $$
    BEGIN
        PERFORM pg_notify('disconnect_queue_notify', NEW.id::text);
        RETURN NEW;
    END;
    $$ LANGUAGE plpgsql
    "#,
    r#"
    DROP TRIGGER IF EXISTS trg_notify_disconnect_queue ON disconnect_queue
    "#,
    r#"
    CREATE TRIGGER trg_notify_disconnect_queue
    AFTER INSERT ON disconnect_queue
    FOR EACH ROW EXECUTE FUNCTION notify_disconnect_queue()
    "#,
    // plan_expiry_notify (§4.9): fired when a plan's status flips to expired.
    r#"
    CREATE OR REPLACE FUNCTION notify_plan_expiry() RETURNS trigger AS $$
    BEGIN
        IF NEW.status = 'expired' AND (OLD.status IS NULL OR OLD.status <> 'expired') THEN
            PERFORM pg_notify('plan_expiry_notify', NEW.username);
        END IF;
        RETURN NEW;
    END;
    $$ LANGUAGE plpgsql
    "#,
    r#"
    DROP TRIGGER IF EXISTS trg_notify_plan_expiry ON user_plans
    "#,
    r#"
    CREATE TRIGGER trg_notify_plan_expiry
    AFTER INSERT OR UPDATE ON user_plans
    FOR EACH ROW EXECUTE FUNCTION notify_plan_expiry()
    "#,
    // session_count_change (§4.9): payload is JSON {username, action}.
    r#"
    CREATE OR REPLACE FUNCTION notify_session_count_change() RETURNS trigger AS $$
    DECLARE
        payload JSON;
    BEGIN
        IF TG_OP = 'INSERT' THEN
            payload := json_build_object('username', NEW.username, 'action', 'start');
        ELSIF TG_OP = 'UPDATE' AND NEW.stop_time IS NOT NULL AND OLD.stop_time IS NULL THEN
            payload := json_build_object('username', NEW.username, 'action', 'stop');
        ELSE
            RETURN NEW;
        END IF;
        PERFORM pg_notify('session_count_change', payload::text);
        RETURN NEW;
    END;
    $$ LANGUAGE plpgsql
    "#,
    r#"
    DROP TRIGGER IF EXISTS trg_notify_session_count_change ON accounting_sessions
    "#,
    r#"
    CREATE TRIGGER trg_notify_session_count_change
    AFTER INSERT OR UPDATE ON accounting_sessions
    FOR EACH ROW EXECUTE FUNCTION notify_session_count_change()
    "#,
];

/// Run every migration statement in order against `pool`. Idempotent: safe
/// to call on every process start.
pub async fn run_migrations(pool: &PgPool) -> DurableStoreResult<()> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    info!(count = STATEMENTS.len(), "durable store migrations applied");
    Ok(())
}
