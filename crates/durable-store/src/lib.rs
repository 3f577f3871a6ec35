//! Durable relational store (§3, §6): routers, accounting sessions, quotas,
//! reply/check attributes, disconnect queue, end-users, user-plans, plus
//! the `LISTEN`/`NOTIFY` change channels the notification listener (§4.9)
//! subscribes to.

mod db;
mod error;
mod migrations;
mod models;
pub mod queries;

pub use db::{Database, DISCONNECT_QUEUE_CHANNEL, PLAN_EXPIRY_CHANNEL, SESSION_COUNT_CHANNEL};
pub use error::{DurableStoreError, DurableStoreResult};
pub use models::*;
