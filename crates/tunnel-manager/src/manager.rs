//! Tunnel manager (§4.5): creates sessions behind a 3s start probe, relays
//! data in both directions, and tears sessions down on idle cap, explicit
//! close, or router disconnect.

use crate::error::{TunnelError, TunnelResult};
use crate::session::{ClientSink, SessionTable, TunnelSession};
use base64::Engine;
use dashmap::DashMap;
use router_endpoint::{DispatchOutcome, FromRouterFrame, RouterDispatch, RouterEvent, RouterEventKind, ToRouterFrame};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use ttl_store::ConnectionRegistry;

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);
const IDLE_CAP: Duration = Duration::from_secs(3600);
const IDLE_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

enum StartOutcome {
    Started,
    Failed(String),
}

/// Owns every tunnel session this instance is authoritative for (§3: "at
/// most one authoritative holder per session-id" — the creating instance).
#[derive(Clone)]
pub struct TunnelManager {
    dispatch: RouterDispatch,
    registry: ConnectionRegistry,
    bus: message_bus::MessageBus,
    sessions: SessionTable,
    starts: Arc<DashMap<String, oneshot::Sender<StartOutcome>>>,
}

impl TunnelManager {
    pub fn new(dispatch: RouterDispatch, registry: ConnectionRegistry, bus: message_bus::MessageBus) -> Self {
        Self {
            dispatch,
            registry,
            bus,
            sessions: SessionTable::new(),
            starts: Arc::new(DashMap::new()),
        }
    }

    /// §4.5 `create`: probe the router and block up to 3s for its
    /// `tunnel-started` ack before handing back a session-id.
    pub async fn create(&self, router_id: &str, client_tx: ClientSink) -> TunnelResult<String> {
        if !self
            .registry
            .is_online(router_id)
            .await
            .map_err(|err| TunnelError::Transport(err.to_string()))?
        {
            return Err(TunnelError::RouterOffline(router_id.to_string()));
        }

        let session_id = control_core::generate_tunnel_session_id(router_id);
        let (tx, rx) = oneshot::channel();
        self.starts.insert(session_id.clone(), tx);

        let start_frame = ToRouterFrame::TunnelStart {
            session_id: session_id.clone(),
        };
        let outcome = self
            .dispatch
            .send_to_router(
                router_id,
                start_frame.clone(),
                &ttl_store::tunnel_channel(router_id),
                &start_frame,
            )
            .await
            .map_err(|err| {
                self.starts.remove(&session_id);
                map_dispatch_error(router_id, err)
            })?;

        // When the router's connection is owned elsewhere, that instance
        // can't resolve our `starts` entry directly; it republishes the
        // router's answer on the per-session channel instead, so we need
        // to be listening for it before the probe can complete.
        let relay_task = if outcome == DispatchOutcome::Remote {
            Some(self.spawn_session_relay_listener(session_id.clone()))
        } else {
            None
        };

        let result = match tokio::time::timeout(PROBE_TIMEOUT, rx).await {
            Ok(Ok(StartOutcome::Started)) => {
                self.sessions
                    .insert(session_id.clone(), TunnelSession::new(router_id.to_string(), client_tx));
                Ok(session_id.clone())
            }
            Ok(Ok(StartOutcome::Failed(detail))) => Err(TunnelError::Rejected {
                session_id: session_id.clone(),
                detail,
            }),
            Ok(Err(_)) => Err(TunnelError::Transport(router_id.to_string())),
            Err(_) => {
                self.starts.remove(&session_id);
                Err(TunnelError::ProbeTimeout(session_id.clone()))
            }
        };

        if result.is_err() {
            if let Some(task) = relay_task {
                task.abort();
            }
        }
        result
    }

    /// §4.5 data-from-client path: dispatch local-or-bus, identical to the
    /// RPC command manager's transport decision.
    pub async fn send_client_data(&self, session_id: &str, data: Vec<u8>) -> TunnelResult<()> {
        let router_id = self
            .sessions
            .router_id_of(session_id)
            .ok_or_else(|| TunnelError::UnknownSession(session_id.to_string()))?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(data);
        let frame = ToRouterFrame::TunnelData {
            session_id: session_id.to_string(),
            data: encoded,
        };
        self.dispatch
            .send_to_router(&router_id, frame.clone(), &ttl_store::tunnel_channel(&router_id), &frame)
            .await
            .map_err(|err| map_dispatch_error(&router_id, err))?;
        self.sessions.touch(session_id);
        Ok(())
    }

    /// §4.5 `close`: idempotent, optionally notifies the router.
    pub async fn close(&self, session_id: &str, notify_router: bool) {
        let Some(session) = self.sessions.remove(session_id) else {
            return;
        };
        if notify_router {
            let frame = ToRouterFrame::TunnelStop {
                session_id: session_id.to_string(),
            };
            let channel = ttl_store::tunnel_channel(&session.router_id);
            if let Err(err) = self
                .dispatch
                .send_to_router(&session.router_id, frame.clone(), &channel, &frame)
                .await
            {
                debug!(session_id, %err, "tunnel-stop delivery failed, session already torn down locally");
            }
        }
    }

    /// All sessions for `router_id` close without notifying it (§4.5:
    /// "all sessions for a router close on its disconnect").
    async fn close_all_for_router(&self, router_id: &str) {
        for session_id in self.sessions.ids_for_router(router_id) {
            self.sessions.remove(&session_id);
        }
    }

    /// §4.5 idle cap: reap sessions with no activity for 1h.
    pub fn spawn_idle_sweep(&self) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(IDLE_SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                for session_id in manager.sessions.idle_ids(IDLE_CAP.as_millis() as i64) {
                    debug!(session_id, "closing idle tunnel session");
                    manager.close(&session_id, true).await;
                }
            }
        })
    }

    /// Drives session state off the shared `RouterEvent` stream for every
    /// router this instance owns the connection for: resolves start
    /// probes, relays router-originated data to the client, and republishes
    /// events for sessions owned by another instance.
    pub async fn run_event_loop(&self, mut events: tokio::sync::mpsc::Receiver<RouterEvent>) {
        while let Some(event) = events.recv().await {
            match event.kind {
                RouterEventKind::Frame(frame @ FromRouterFrame::TunnelStarted { .. })
                | RouterEventKind::Frame(frame @ FromRouterFrame::TunnelError { .. })
                | RouterEventKind::Frame(frame @ FromRouterFrame::TunnelData { .. }) => {
                    self.handle_router_frame(&event.router_id, frame, true).await;
                }
                RouterEventKind::Disconnected => {
                    self.close_all_for_router(&event.router_id).await;
                }
                _ => {}
            }
        }
    }

    async fn handle_router_frame(&self, router_id: &str, frame: FromRouterFrame, allow_relay: bool) {
        let session_id = match &frame {
            FromRouterFrame::TunnelStarted { session_id } => session_id.clone(),
            FromRouterFrame::TunnelError { session_id, .. } => session_id.clone(),
            FromRouterFrame::TunnelData { session_id, .. } => session_id.clone(),
            _ => return,
        };

        if let Some((_, tx)) = self.starts.remove(&session_id) {
            let outcome = match &frame {
                FromRouterFrame::TunnelStarted { .. } => StartOutcome::Started,
                FromRouterFrame::TunnelError { error, .. } => StartOutcome::Failed(error.clone()),
                _ => return,
            };
            let _ = tx.send(outcome);
            return;
        }

        if self.sessions.contains(&session_id) {
            match frame {
                FromRouterFrame::TunnelData { data, .. } => {
                    self.deliver_to_client(&session_id, &data).await;
                }
                FromRouterFrame::TunnelError { error, .. } => {
                    warn!(session_id, error, "router reported tunnel error, closing session");
                    self.close(&session_id, false).await;
                }
                _ => {}
            }
            return;
        }

        // Not ours: session was created on another instance while we own
        // the router connection. Republish for that instance to pick up.
        // Only the owning-instance event loop does this; the per-session
        // relay listener itself must never re-publish what it just
        // received, or a race with its own `starts`/`sessions` removal
        // would echo the frame back onto the same channel forever.
        if !allow_relay {
            return;
        }
        let channel = ttl_store::tunnel_session_channel(&session_id);
        if let Err(err) = self.bus.publish_json(&channel, &frame).await {
            warn!(router_id, session_id, %err, "failed to relay tunnel frame to session owner");
        }
    }

    async fn deliver_to_client(&self, session_id: &str, data: &str) {
        let Some(client_tx) = self.sessions.client_tx_of(session_id) else {
            return;
        };
        let decoded = match base64::engine::general_purpose::STANDARD.decode(data) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(session_id, %err, "malformed base64 tunnel payload, dropping");
                return;
            }
        };
        self.sessions.touch(session_id);
        if client_tx.send(decoded).await.is_err() {
            debug!(session_id, "client sink closed, tearing down tunnel session");
            self.close(session_id, true).await;
        }
    }

    fn spawn_session_relay_listener(&self, session_id: String) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        let channel = ttl_store::tunnel_session_channel(&session_id);
        let (mut rx, _bus_task) = self.bus.subscribe(channel);
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let frame: FromRouterFrame = match message_bus::MessageBus::decode(&message).await {
                    Ok(frame) => frame,
                    Err(err) => {
                        warn!(%err, "malformed relayed tunnel frame, ignoring");
                        continue;
                    }
                };
                manager.handle_router_frame("", frame, false).await;
            }
        })
    }
}

fn map_dispatch_error(router_id: &str, err: router_endpoint::EndpointError) -> TunnelError {
    match err {
        router_endpoint::EndpointError::RouterOffline(_) => TunnelError::RouterOffline(router_id.to_string()),
        other => TunnelError::Transport(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_ids_empty_for_fresh_session() {
        let table = SessionTable::new();
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        table.insert("s-1".to_string(), TunnelSession::new("r-1".to_string(), tx));
        assert!(table.idle_ids(3600_000).is_empty());
        assert_eq!(table.ids_for_router("r-1"), vec!["s-1".to_string()]);
    }
}
