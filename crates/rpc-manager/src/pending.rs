//! The in-flight pending-command table (§3 "RPC pending command", §4.4).
//! Exclusively owned by the command manager; the only writers are `send`
//! and `handle_response`, and removal is a compare-and-remove on
//! command-id (§5 Shared mutation).

use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::oneshot;

/// What a router (or a remote instance relaying one) answered with.
#[derive(Debug, Clone)]
pub enum RpcOutcome {
    Ok(Value),
    RemoteError(Value),
}

/// How a pending command gets its answer delivered once it resolves.
/// `Local` is a command this instance's own caller is blocked on; `Bus` is
/// a command relayed here on behalf of another instance (§4.4 steps 3-4),
/// which resolves by publishing on the requester's response channel
/// instead of waking a local waiter.
pub(crate) enum Resolver {
    Local(oneshot::Sender<RpcOutcome>),
    Bus { response_channel: String },
}

pub(crate) struct PendingEntry {
    pub router_id: String,
    pub resolver: Resolver,
}

/// Table of commands this instance is still awaiting a response for,
/// keyed by command-id — both self-originated calls and bus-relayed
/// requests this instance is servicing on another instance's behalf.
#[derive(Clone, Default)]
pub(crate) struct PendingTable {
    entries: Arc<DashMap<String, PendingEntry>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, command_id: String, router_id: String, resolver: Resolver) {
        self.entries.insert(command_id, PendingEntry { router_id, resolver });
    }

    /// Compare-and-remove: takes ownership of the entry in one atomic step
    /// so a late response racing a deadline can never double-resolve.
    pub fn take(&self, command_id: &str) -> Option<PendingEntry> {
        self.entries.remove(command_id).map(|(_, entry)| entry)
    }

    pub fn remove(&self, command_id: &str) -> bool {
        self.entries.remove(command_id).is_some()
    }

    /// §4.4 step 8 / §8 testable property: on connection loss, every
    /// pending command for that router fails within 100ms. Returns the
    /// removed entries; resolving `Bus` entries requires publishing on the
    /// message bus, which the caller (the command manager) does.
    pub fn take_all_for_router(&self, router_id: &str) -> Vec<PendingEntry> {
        let ids: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.value().router_id == router_id)
            .map(|entry| entry.key().clone())
            .collect();
        ids.into_iter()
            .filter_map(|id| self.entries.remove(&id).map(|(_, entry)| entry))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// The canned outcome used whenever a pending command is failed out from
/// under its caller by a connection loss rather than an explicit answer.
pub(crate) fn transport_lost_outcome() -> RpcOutcome {
    RpcOutcome::RemoteError(serde_json::json!({
        "code": "transport",
        "message": "connection lost",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn take_is_compare_and_remove() {
        let table = PendingTable::new();
        let (tx, rx) = oneshot::channel();
        table.insert("cmd-1".to_string(), "router-1".to_string(), Resolver::Local(tx));
        let entry = table.take("cmd-1").expect("present on first take");
        assert!(table.take("cmd-1").is_none());
        match entry.resolver {
            Resolver::Local(sender) => {
                let _ = sender.send(RpcOutcome::Ok(serde_json::json!(1)));
            }
            Resolver::Bus { .. } => panic!("expected local resolver"),
        }
        let outcome = rx.await.unwrap();
        assert!(matches!(outcome, RpcOutcome::Ok(_)));
    }

    #[tokio::test]
    async fn take_all_for_router_only_touches_matching_entries() {
        let table = PendingTable::new();
        let (tx_a, _rx_a) = oneshot::channel();
        let (tx_b, _rx_b) = oneshot::channel();
        table.insert("cmd-a".to_string(), "router-1".to_string(), Resolver::Local(tx_a));
        table.insert("cmd-b".to_string(), "router-2".to_string(), Resolver::Local(tx_b));

        let failed = table.take_all_for_router("router-1");
        assert_eq!(failed.len(), 1);
        assert_eq!(table.len(), 1);
    }
}
