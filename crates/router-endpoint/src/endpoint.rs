//! Inbound router endpoint (§4.1): accept, authenticate, register, pump
//! messages. One logical task per connection; the endpoint itself is
//! multi-connection parallel.

use crate::dispatch::{LocalRouters, RouterDispatch};
use crate::error::{EndpointError, EndpointResult};
use crate::messages::{FromRouterFrame, ToRouterFrame};
use durable_store::{queries, Database, RouterStatus};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};
use ttl_store::ConnectionRegistry;

/// Pulled off the WebSocket upgrade request's query string
/// (`?router_id=...&token=...`) during the opening handshake, before any
/// async db lookup can run — the handshake callback itself must be
/// synchronous, so credentials are parsed here and authenticated afterward.
fn parse_credentials(request: &Request) -> Option<(String, String)> {
    let query = request.uri().query()?;
    let mut router_id = None;
    let mut token = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "router_id" => router_id = Some(value.into_owned()),
            "token" => token = Some(value.into_owned()),
            _ => {}
        }
    }
    Some((router_id?, token?))
}

/// Liveness tuning (§4.1, §6): ping every 30s by default, close if no pong
/// within 60s, and rate-limit durable-store liveness writebacks to once
/// every 10 minutes to avoid write amplification.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub instance_id: String,
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
    pub liveness_writeback_interval: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            instance_id: control_core::InstanceId::generate().to_string(),
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(60),
            liveness_writeback_interval: Duration::from_secs(600),
        }
    }
}

/// Events a connection task forwards to external subscribers — the RPC
/// manager, tunnel manager, and the reconciliation scheduler all consume
/// this same stream and ignore the variants they don't care about (§9:
/// "each is a long-lived task with an input channel").
#[derive(Debug, Clone)]
pub enum RouterEventKind {
    /// First successful registration. `after_gap` is true when this
    /// router had no prior registry fact, i.e. a reconciliation sweep and
    /// retry-enqueue should be spawned for it (§4.1).
    Connected { after_gap: bool },
    /// Connection closed or failed; pending commands/tunnels for this
    /// router should be torn down and a reconciliation sweep scheduled.
    Disconnected,
    Frame(FromRouterFrame),
}

#[derive(Debug, Clone)]
pub struct RouterEvent {
    pub router_id: String,
    pub kind: RouterEventKind,
}

/// Accepts and authenticates router connections, owning the connection
/// registry's local half and the per-connection liveness loop.
#[derive(Clone)]
pub struct RouterEndpoint {
    db: Database,
    registry: ConnectionRegistry,
    local: LocalRouters,
    dispatch: RouterDispatch,
    events_tx: mpsc::Sender<RouterEvent>,
    config: EndpointConfig,
}

impl RouterEndpoint {
    pub fn new(
        db: Database,
        registry: ConnectionRegistry,
        local: LocalRouters,
        dispatch: RouterDispatch,
        events_tx: mpsc::Sender<RouterEvent>,
        config: EndpointConfig,
    ) -> Self {
        Self {
            db,
            registry,
            local,
            dispatch,
            events_tx,
            config,
        }
    }

    pub fn dispatch(&self) -> &RouterDispatch {
        &self.dispatch
    }

    /// Extract `(router-id, token)` from the upgrade request, authenticate
    /// and register the router, then spawn the connection pump task.
    /// Returns once the handshake and registration complete; the pump
    /// itself runs in the background until the connection ends (§4.1).
    pub async fn accept(&self, stream: TcpStream, client_address: SocketAddr) -> EndpointResult<()> {
        let credentials = Arc::new(Mutex::new(None));
        let captured = Arc::clone(&credentials);
        let ws_stream = tokio_tungstenite::accept_hdr_async(stream, move |req: &Request, resp: Response| {
            *captured.lock().expect("credentials mutex poisoned") = parse_credentials(req);
            Ok(resp)
        })
        .await
        .map_err(EndpointError::Transport)?;

        let (router_id, token) = credentials
            .lock()
            .expect("credentials mutex poisoned")
            .take()
            .ok_or(EndpointError::Policy)?;

        let router = match queries::get_router(self.db.pool(), &router_id).await? {
            Some(router) => router,
            None => return Self::reject(ws_stream, EndpointError::Policy).await,
        };
        if router.token != token {
            warn!(router_id, "router auth rejected: token mismatch");
            return Self::reject(ws_stream, EndpointError::Policy).await;
        }

        let new_secret = if router.radius_secret.is_none() {
            Some(control_core::generate_router_secret())
        } else {
            None
        };
        let new_address = client_address.ip().to_string();
        let address_changed = router.address.as_deref() != Some(new_address.as_str());

        if new_secret.is_some() || address_changed {
            queries::update_router_connection_state(
                self.db.pool(),
                &router_id,
                address_changed.then_some(new_address.as_str()),
                new_secret.as_deref(),
            )
            .await
            .map_err(|_| EndpointError::Internal("router connection state rebind failed".into()))?;
        }

        let was_reconnect_after_gap = self.registry.locate(&router_id).await?.is_none();

        self.registry.register(&router_id, &self.config.instance_id).await?;
        self.registry.heartbeat(&router_id).await?;
        queries::touch_router_last_seen(self.db.pool(), &router_id, RouterStatus::Online).await?;

        let (to_router_tx, to_router_rx) = mpsc::channel::<ToRouterFrame>(256);
        self.local.insert(&router_id, to_router_tx.clone());

        let connection = ConnectionTask {
            router_id: router_id.clone(),
            db: self.db.clone(),
            registry: self.registry.clone(),
            local: self.local.clone(),
            events_tx: self.events_tx.clone(),
            config: self.config.clone(),
        };
        tokio::spawn(connection.run(ws_stream, to_router_rx));

        let _ = self
            .events_tx
            .send(RouterEvent {
                router_id: router_id.clone(),
                kind: RouterEventKind::Connected {
                    after_gap: was_reconnect_after_gap,
                },
            })
            .await;

        info!(router_id, was_reconnect_after_gap, "router connected and registered");
        Ok(())
    }

    /// Send a close frame carrying `err`'s close code, then report the
    /// rejection. The opening handshake already completed by the time
    /// credentials can be checked (db lookups are async, the handshake
    /// callback isn't), so rejection is a closing handshake, not a
    /// pre-upgrade HTTP error (§4.1: "rejects with close code `policy`").
    async fn reject(mut ws_stream: WebSocketStream<TcpStream>, err: EndpointError) -> EndpointResult<()> {
        let close_code = err.close_code();
        let _ = ws_stream
            .send(Message::Close(Some(tokio_tungstenite::tungstenite::protocol::CloseFrame {
                code: close_code,
                reason: "".into(),
            })))
            .await;
        Err(err)
    }
}

struct ConnectionTask {
    router_id: String,
    db: Database,
    registry: ConnectionRegistry,
    local: LocalRouters,
    events_tx: mpsc::Sender<RouterEvent>,
    config: EndpointConfig,
}

impl ConnectionTask {
    async fn run(self, ws_stream: WebSocketStream<TcpStream>, mut to_router_rx: mpsc::Receiver<ToRouterFrame>) {
        let (mut sink, mut stream) = ws_stream.split();

        let connected = serde_json::to_string(&ToRouterFrame::Connected {
            router_id: self.router_id.clone(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        })
        .expect("ToRouterFrame::Connected always serializes");
        if sink.send(Message::Text(connected)).await.is_err() {
            self.cleanup().await;
            return;
        }

        let mut ping_ticker = tokio::time::interval(self.config.ping_interval);
        let mut last_pong = tokio::time::Instant::now();
        let mut renew_ticker = tokio::time::interval(Duration::from_secs(ttl_store::CONNECTION_RENEW_SECS));
        let mut writeback_ticker = tokio::time::interval(self.config.liveness_writeback_interval);

        loop {
            tokio::select! {
                _ = ping_ticker.tick() => {
                    if last_pong.elapsed() > self.config.pong_timeout {
                        warn!(router_id = %self.router_id, "pong timeout exceeded, closing connection");
                        let _ = sink
                            .send(Message::Close(Some(tokio_tungstenite::tungstenite::protocol::CloseFrame {
                                code: tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode::Away,
                                reason: "".into(),
                            })))
                            .await;
                        break;
                    }
                    if sink.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
                _ = renew_ticker.tick() => {
                    if self.registry.register(&self.router_id, &self.config.instance_id).await.is_err() {
                        error!(router_id = %self.router_id, "failed to renew connection registry fact");
                    }
                }
                _ = writeback_ticker.tick() => {
                    let _ = queries::touch_router_last_seen(self.db.pool(), &self.router_id, RouterStatus::Online).await;
                }
                outbound = to_router_rx.recv() => {
                    match outbound {
                        Some(frame) => {
                            let encoded = match serde_json::to_string(&frame) {
                                Ok(encoded) => encoded,
                                Err(err) => { error!(router_id = %self.router_id, %err, "failed to encode outbound frame"); continue; }
                            };
                            if sink.send(Message::Text(encoded)).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                incoming = stream.next() => {
                    match incoming {
                        Some(Ok(Message::Pong(_))) => {
                            last_pong = tokio::time::Instant::now();
                            let _ = self.registry.heartbeat(&self.router_id).await;
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            last_pong = tokio::time::Instant::now();
                            let _ = self.registry.heartbeat(&self.router_id).await;
                            if sink.send(Message::Pong(payload)).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Text(text))) => {
                            last_pong = tokio::time::Instant::now();
                            let _ = self.registry.heartbeat(&self.router_id).await;
                            self.handle_text_frame(&text).await;
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            debug!(router_id = %self.router_id, %err, "router connection read error");
                            break;
                        }
                    }
                }
            }
        }

        self.cleanup().await;
    }

    async fn handle_text_frame(&self, text: &str) {
        let frame: FromRouterFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(router_id = %self.router_id, %err, "malformed frame from router, ignoring");
                return;
            }
        };
        if let FromRouterFrame::NameUpdate { ref name } = frame {
            if let Err(err) = queries::update_router_name(self.db.pool(), &self.router_id, name).await {
                error!(router_id = %self.router_id, %err, "failed to persist router name update");
            }
        }
        let _ = self
            .events_tx
            .send(RouterEvent {
                router_id: self.router_id.clone(),
                kind: RouterEventKind::Frame(frame),
            })
            .await;
    }

    async fn cleanup(&self) {
        self.local.remove(&self.router_id);
        let _ = self.registry.unregister(&self.router_id).await;
        let _ = queries::set_router_status(self.db.pool(), &self.router_id, RouterStatus::Offline).await;
        let _ = self
            .events_tx
            .send(RouterEvent {
                router_id: self.router_id.clone(),
                kind: RouterEventKind::Disconnected,
            })
            .await;
        info!(router_id = %self.router_id, "router connection closed, state cleaned up");
    }
}
