//! The local half of the connection registry (§3 Ownership summary: "the
//! inbound endpoint exclusively owns ... the local half of the connection
//! registry") plus the single polymorphic `send-to-router` transport the
//! RPC and tunnel managers both dispatch through (§9 Design Notes:
//! "a single polymorphic transport interface `send-to-router(router-id,
//! envelope)` with two concrete variants {local-handle, bus-publish};
//! identical call sites, chosen by `locate`").

use crate::error::{EndpointError, EndpointResult};
use crate::messages::ToRouterFrame;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use ttl_store::ConnectionRegistry;

/// Per-process map of router-id to the sender half of its connection task's
/// outbound channel. Present only while this instance owns an open
/// connection for that router.
#[derive(Clone, Default)]
pub struct LocalRouters {
    handles: Arc<DashMap<String, mpsc::Sender<ToRouterFrame>>>,
}

impl LocalRouters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, router_id: &str, sender: mpsc::Sender<ToRouterFrame>) {
        self.handles.insert(router_id.to_string(), sender);
    }

    pub fn remove(&self, router_id: &str) {
        self.handles.remove(router_id);
    }

    pub fn get(&self, router_id: &str) -> Option<mpsc::Sender<ToRouterFrame>> {
        self.handles.get(router_id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, router_id: &str) -> bool {
        self.handles.contains_key(router_id)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Where a `send_to_router` call ended up being delivered. Callers use this
/// only for logging/metrics; the caller-visible contract is the same
/// either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Local,
    Remote,
}

/// Resolves `locate(router-id)` and either writes directly to a local
/// connection or publishes on the message bus — the one decision point
/// every cross-instance call site (RPC, tunnel data) shares.
#[derive(Clone)]
pub struct RouterDispatch {
    registry: ConnectionRegistry,
    local: LocalRouters,
    bus: message_bus::MessageBus,
}

impl RouterDispatch {
    pub fn new(registry: ConnectionRegistry, local: LocalRouters, bus: message_bus::MessageBus) -> Self {
        Self { registry, local, bus }
    }

    pub fn local_routers(&self) -> &LocalRouters {
        &self.local
    }

    pub async fn is_local(&self, router_id: &str) -> bool {
        self.local.contains(router_id)
    }

    /// §4.4 steps 1/3/4 and §4.5's client→router data path: if this
    /// instance owns the connection, write the frame to it directly;
    /// otherwise, if some instance owns it (per the registry), publish the
    /// bus envelope on `publish_channel`; otherwise the router is offline.
    pub async fn send_to_router<T: Serialize>(
        &self,
        router_id: &str,
        local_frame: ToRouterFrame,
        publish_channel: &str,
        bus_envelope: &T,
    ) -> EndpointResult<DispatchOutcome> {
        if let Some(sender) = self.local.get(router_id) {
            sender
                .send(local_frame)
                .await
                .map_err(|_| EndpointError::RouterOffline(router_id.to_string()))?;
            return Ok(DispatchOutcome::Local);
        }
        if self.registry.locate(router_id).await?.is_some() {
            self.bus.publish_json(publish_channel, bus_envelope).await?;
            return Ok(DispatchOutcome::Remote);
        }
        Err(EndpointError::RouterOffline(router_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_routers_tracks_presence() {
        let locals = LocalRouters::new();
        assert!(!locals.contains("r1"));
        let (tx, _rx) = mpsc::channel(1);
        locals.insert("r1", tx);
        assert!(locals.contains("r1"));
        locals.remove("r1");
        assert!(!locals.contains("r1"));
    }
}
