//! Command manager (§4.4): `send`/`handle_response`, the response listener
//! for this instance's own outbound calls, and the per-router subscriber
//! that services bus-relayed requests against a locally-owned connection.

use crate::envelope::{RpcBusRequest, RpcBusResponse};
use crate::error::{RpcError, RpcResult};
use crate::pending::{transport_lost_outcome, PendingTable, Resolver, RpcOutcome};
use router_endpoint::{EndpointError, RouterDispatch, RouterEvent, RouterEventKind, ToRouterFrame};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, warn};

/// Owns the in-flight command table and the transport decision (§9). One
/// instance per control-plane process, shared by every caller that issues
/// RPCs to routers.
#[derive(Clone)]
pub struct CommandManager {
    instance_id: String,
    dispatch: RouterDispatch,
    bus: message_bus::MessageBus,
    pending: PendingTable,
}

impl CommandManager {
    pub fn new(instance_id: String, dispatch: RouterDispatch, bus: message_bus::MessageBus) -> Self {
        Self {
            instance_id,
            dispatch,
            bus,
            pending: PendingTable::new(),
        }
    }

    /// §4.4 steps 1-8: issue a command, dispatch it local-or-bus, and wait
    /// up to `timeout` for the router's answer.
    pub async fn send(
        &self,
        router_id: &str,
        path: &str,
        method: &str,
        args: Value,
        timeout: Duration,
    ) -> RpcResult<Value> {
        let command_id = control_core::generate_command_id(&control_core::InstanceId::new(self.instance_id.clone()));
        let (tx, rx) = oneshot::channel();
        self.pending
            .insert(command_id.clone(), router_id.to_string(), Resolver::Local(tx));

        let local_frame = ToRouterFrame::Rpc {
            id: command_id.clone(),
            path: path.to_string(),
            method: method.to_string(),
            args: args.clone(),
        };
        let bus_envelope = RpcBusRequest::new(
            command_id.clone(),
            path.to_string(),
            method.to_string(),
            args,
            ttl_store::rpc_response_channel(&self.instance_id),
        );

        if let Err(err) = self
            .dispatch
            .send_to_router(router_id, local_frame, &ttl_store::rpc_channel(router_id), &bus_envelope)
            .await
        {
            self.pending.remove(&command_id);
            return Err(map_dispatch_error(router_id, err));
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(RpcOutcome::Ok(value))) => Ok(value),
            Ok(Ok(RpcOutcome::RemoteError(detail))) => Err(RpcError::RemoteError { detail }),
            Ok(Err(_)) => Err(RpcError::Transport(router_id.to_string())),
            Err(_) => {
                self.pending.remove(&command_id);
                Err(RpcError::Timeout {
                    router_id: router_id.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Resolve a pending command, however the answer arrived: a `Local`
    /// resolver wakes the blocked caller directly; a `Bus` resolver
    /// publishes the answer back to the instance that relayed the request
    /// here (§4.4 step 7).
    async fn resolve(&self, command_id: &str, result: Option<Value>, error: Option<Value>) {
        let Some(entry) = self.pending.take(command_id) else {
            return;
        };
        match entry.resolver {
            Resolver::Local(sender) => {
                let outcome = match error {
                    Some(detail) => RpcOutcome::RemoteError(detail),
                    None => RpcOutcome::Ok(result.unwrap_or(Value::Null)),
                };
                let _ = sender.send(outcome);
            }
            Resolver::Bus { response_channel } => {
                let response = RpcBusResponse {
                    id: command_id.to_string(),
                    result,
                    error,
                };
                if let Err(err) = self.bus.publish_json(&response_channel, &response).await {
                    warn!(command_id, %err, "failed to publish rpc response on message bus");
                }
            }
        }
    }

    /// §4.4 step 8 / §8: fail every command pending against `router_id`
    /// within 100ms of the connection loss being observed.
    async fn fail_router(&self, router_id: &str) {
        for entry in self.pending.take_all_for_router(router_id) {
            match entry.resolver {
                Resolver::Local(sender) => {
                    let _ = sender.send(transport_lost_outcome());
                }
                Resolver::Bus { response_channel } => {
                    let response = RpcBusResponse {
                        id: String::new(),
                        result: None,
                        error: Some(serde_json::json!({"code": "transport", "message": "connection lost"})),
                    };
                    if let Err(err) = self.bus.publish_json(&response_channel, &response).await {
                        warn!(router_id, %err, "failed to publish transport-lost rpc response");
                    }
                }
            }
        }
    }

    /// Drives this instance's own response-resolution path: consumes
    /// `RouterEvent`s (filtering for `Frame(RpcResult)` and
    /// `Disconnected`) off the shared stream every router-owning component
    /// subscribes to.
    pub async fn run_event_loop(&self, mut events: mpsc::Receiver<RouterEvent>) {
        while let Some(event) = events.recv().await {
            match event.kind {
                RouterEventKind::Frame(router_endpoint::FromRouterFrame::RpcResult { id, result, error }) => {
                    self.resolve(&id, result, error).await;
                }
                RouterEventKind::Disconnected => {
                    self.fail_router(&event.router_id).await;
                }
                _ => {}
            }
        }
    }

    /// Listens on this instance's own response channel for answers to
    /// commands it relayed to another instance over the bus (§4.4 step 4).
    pub fn spawn_response_listener(&self) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        let channel = ttl_store::rpc_response_channel(&self.instance_id);
        let (mut rx, _bus_task) = self.bus.subscribe(channel);
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let response: RpcBusResponse = match message_bus::MessageBus::decode(&message).await {
                    Ok(response) => response,
                    Err(err) => {
                        warn!(%err, "malformed rpc bus response, ignoring");
                        continue;
                    }
                };
                manager.resolve(&response.id, response.result, response.error).await;
            }
        })
    }

    /// Services bus-relayed requests for one locally-owned router: any
    /// instance that does not own `router_id`'s connection publishes its
    /// request on `rpc/<router-id>` instead of writing directly, and the
    /// owning instance (this one) relays it onward and tracks the
    /// response the same way as a self-originated command (§4.4 step 3).
    pub fn spawn_router_request_subscriber(&self, router_id: String) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        let channel = ttl_store::rpc_channel(&router_id);
        let (mut rx, _bus_task) = self.bus.subscribe(channel);
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let request: RpcBusRequest = match message_bus::MessageBus::decode(&message).await {
                    Ok(request) => request,
                    Err(err) => {
                        warn!(%err, "malformed rpc bus request, ignoring");
                        continue;
                    }
                };
                let Some(sender) = manager.dispatch.local_routers().get(&router_id) else {
                    // Ownership moved on since the request was published; the
                    // requester's `send` call will time out and retry its
                    // own `locate` on the next attempt.
                    continue;
                };
                manager.pending.insert(
                    request.id.clone(),
                    router_id.clone(),
                    Resolver::Bus {
                        response_channel: request.response_channel.clone(),
                    },
                );
                let frame = ToRouterFrame::Rpc {
                    id: request.id.clone(),
                    path: request.path,
                    method: request.method,
                    args: request.args,
                };
                if sender.send(frame).await.is_err() {
                    manager.pending.remove(&request.id);
                    error!(router_id = %router_id, "local router sender closed while relaying bus request");
                }
            }
        })
    }
}

fn map_dispatch_error(router_id: &str, err: EndpointError) -> RpcError {
    match err {
        EndpointError::RouterOffline(_) => RpcError::RouterOffline(router_id.to_string()),
        other => RpcError::Transport(other.to_string()),
    }
}
