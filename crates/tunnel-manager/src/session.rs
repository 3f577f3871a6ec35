//! Tunnel session bookkeeping (§3 "Tunnel session").

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Raw bytes from the router, written verbatim to whatever owns the
/// client side of the tunnel. The creator of a session supplies this
/// sender at `create` time; the manager never interprets the payload.
pub type ClientSink = mpsc::Sender<Vec<u8>>;

/// What this instance knows about a session it is authoritative for.
/// Authoritative means this instance is the one that called `create`;
/// it may or may not also own the router's WS connection.
pub(crate) struct TunnelSession {
    pub router_id: String,
    pub client_tx: ClientSink,
    last_activity_ms: AtomicI64,
}

impl TunnelSession {
    pub fn new(router_id: String, client_tx: ClientSink) -> Self {
        Self {
            router_id,
            client_tx,
            last_activity_ms: AtomicI64::new(now_ms()),
        }
    }

    pub fn touch(&self) {
        self.last_activity_ms.store(now_ms(), Ordering::Relaxed);
    }

    pub fn idle_for_ms(&self) -> i64 {
        now_ms() - self.last_activity_ms.load(Ordering::Relaxed)
    }
}

#[derive(Clone)]
pub(crate) struct SessionTable {
    sessions: Arc<dashmap::DashMap<String, TunnelSession>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(dashmap::DashMap::new()),
        }
    }

    pub fn insert(&self, session_id: String, session: TunnelSession) {
        self.sessions.insert(session_id, session);
    }

    pub fn remove(&self, session_id: &str) -> Option<TunnelSession> {
        self.sessions.remove(session_id).map(|(_, session)| session)
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn router_id_of(&self, session_id: &str) -> Option<String> {
        self.sessions.get(session_id).map(|entry| entry.router_id.clone())
    }

    pub fn client_tx_of(&self, session_id: &str) -> Option<ClientSink> {
        self.sessions.get(session_id).map(|entry| entry.client_tx.clone())
    }

    pub fn touch(&self, session_id: &str) {
        if let Some(entry) = self.sessions.get(session_id) {
            entry.touch();
        }
    }

    /// Session-ids whose authoritative router is `router_id`, for
    /// router-disconnect teardown.
    pub fn ids_for_router(&self, router_id: &str) -> Vec<String> {
        self.sessions
            .iter()
            .filter(|entry| entry.value().router_id == router_id)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Session-ids idle longer than `idle_cap_ms`.
    pub fn idle_ids(&self, idle_cap_ms: i64) -> Vec<String> {
        self.sessions
            .iter()
            .filter(|entry| entry.value().idle_for_ms() >= idle_cap_ms)
            .map(|entry| entry.key().clone())
            .collect()
    }
}
