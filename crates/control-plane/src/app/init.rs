//! Process startup, the running instance's task fan-out, and graceful
//! shutdown (§4.14, §5, §9).

use crate::app::state::{build, AppState, Components};
use crate::ipc::{self, IpcServer, Method, Request, Response};
use control_config::{Config, Paths};
use router_endpoint::{RouterEvent, RouterEventKind};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Overall drain timeout before a SIGTERM-triggered shutdown force-exits
/// (§4.14, §5).
const DRAIN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);
/// How often the reconciliation sweep runs across the whole local fleet,
/// independent of the immediate per-router sweep `§4.1`'s reconnect-after-gap
/// triggers.
const RECONCILE_FLEET_INTERVAL: std::time::Duration = std::time::Duration::from_secs(300);
/// How often the periodic expiry sweep flips due plans and enqueues
/// period-end-reached quota disconnects (§4.7 bullet 2, §4.9, §8 scenario 2).
const EXPIRY_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

pub async fn run_daemon(config: Config, paths: Paths, foreground: bool) -> Result<(), Box<dyn std::error::Error>> {
    let _ = foreground; // this process never backgrounds itself; callers use `&` or a supervisor.
    paths.ensure_dirs()?;

    match control_lifecycle::check_singleton(&paths.socket_file()) {
        control_lifecycle::SingletonCheck::AlreadyRunning => {
            eprintln!("control-plane is already running");
            std::process::exit(1);
        }
        control_lifecycle::SingletonCheck::StaleSocketCleaned => {
            info!("removed stale control socket from a previous run");
        }
        control_lifecycle::SingletonCheck::Available => {}
    }

    control_lifecycle::write_pid_file(&paths.pid_file())?;

    let result = run_components(config, &paths).await;

    let _ = control_lifecycle::cleanup_pid_file(&paths.pid_file());
    let _ = control_lifecycle::cleanup_socket_file(&paths.socket_file());

    match result {
        Ok(()) => Ok(()),
        Err(err) => {
            error!(%err, "control-plane exited with a fatal startup error");
            std::process::exit(2);
        }
    }
}

async fn run_components(config: Config, paths: &Paths) -> Result<(), Box<dyn std::error::Error>> {
    let listen_port = config.listen_port;
    let Components {
        state,
        router_events_rx,
        dae_server,
        disconnect_worker,
        disconnect_signal_rx,
        notification_listener,
    } = build(config).await?;

    info!(instance_id = %state.instance_id, listen_port, "control-plane starting");

    let mut tasks = Vec::new();

    let (rpc_events_tx, rpc_events_rx) = mpsc::channel(1024);
    let (tunnel_events_tx, tunnel_events_rx) = mpsc::channel(1024);
    tasks.push(tokio::spawn(fan_out_router_events(state.clone(), router_events_rx, rpc_events_tx, tunnel_events_tx)));

    {
        let rpc = state.rpc.clone();
        tasks.push(tokio::spawn(async move { rpc.run_event_loop(rpc_events_rx).await }));
    }
    {
        let tunnels = state.tunnels.clone();
        tasks.push(tokio::spawn(async move { tunnels.run_event_loop(tunnel_events_rx).await }));
    }
    tasks.push(state.rpc.spawn_response_listener());
    tasks.push(state.tunnels.spawn_idle_sweep());
    tasks.push(tokio::spawn(dae_server.run().map_log()));
    tasks.push(tokio::spawn(notification_listener_task(notification_listener)));
    tasks.push(tokio::spawn(disconnect_worker_task(disconnect_worker, disconnect_signal_rx)));
    tasks.push(tokio::spawn(reconcile_fleet_loop(state.clone())));
    tasks.push(tokio::spawn(expire_plans_and_quotas_loop(state.clone())));

    let accept_addr: SocketAddr = format!("0.0.0.0:{}", listen_port).parse()?;
    let listener = TcpListener::bind(accept_addr).await?;
    info!(addr = %accept_addr, "router endpoint listening");
    let shutdown_accept = Arc::new(tokio::sync::Notify::new());
    tasks.push(tokio::spawn(accept_loop(state.clone(), listener, shutdown_accept.clone())));

    let ipc_server = Arc::new(IpcServer::new(&paths.socket_file().to_string_lossy()));
    register_ipc_handlers(&ipc_server, state.clone()).await;

    let ipc_result = ipc_server.run().await;

    shutdown_accept.notify_waiters();
    let _ = state.registry.unregister_all_owned_by(&state.instance_id.to_string()).await;
    for task in tasks {
        task.abort();
    }
    info!("control-plane stopped");

    ipc_result.map_err(|err| Box::new(err) as Box<dyn std::error::Error>)
}

/// Drains the single `RouterEndpoint`-owned event stream and republishes
/// every event to each consumer's own channel, since `RouterEndpoint::new`
/// takes exactly one sender (§9: "a single polymorphic transport
/// interface"). Also triggers the per-router bus subscriber and the
/// reconnect-after-gap reconciliation sweep `§4.1` calls for directly.
async fn fan_out_router_events(
    state: AppState,
    mut events: mpsc::Receiver<RouterEvent>,
    rpc_events_tx: mpsc::Sender<RouterEvent>,
    tunnel_events_tx: mpsc::Sender<RouterEvent>,
) {
    while let Some(event) = events.recv().await {
        if let RouterEventKind::Connected { after_gap } = event.kind {
            let rpc = state.rpc.clone();
            tokio::spawn({
                let router_id = event.router_id.clone();
                async move {
                    rpc.spawn_router_request_subscriber(router_id);
                }
            });
            if after_gap {
                let reconciler = state.reconciler.clone();
                let router_id = event.router_id.clone();
                tokio::spawn(async move {
                    if let Err(err) = reconciler.reconcile_router(&router_id).await {
                        warn!(router_id, %err, "post-reconnect reconciliation sweep failed");
                    }
                });
            }
        }

        let _ = rpc_events_tx.send(event.clone()).await;
        let _ = tunnel_events_tx.send(event).await;
    }
}

async fn accept_loop(state: AppState, listener: TcpListener, shutdown: Arc<tokio::sync::Notify>) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, client_address)) => {
                        let endpoint = state.endpoint.clone();
                        tokio::spawn(async move {
                            if let Err(err) = endpoint.accept(stream, client_address).await {
                                warn!(%client_address, %err, "router connection rejected");
                            }
                        });
                    }
                    Err(err) => error!(%err, "router endpoint accept failed"),
                }
            }
            _ = shutdown.notified() => break,
        }
    }
}

/// §4.7 bullet 2 / §4.9 / §8 scenario 2: the "periodic expiry function" that
/// drives plan-expiry and quota-period-expiry disconnects on a schedule
/// instead of waiting for an external actor to flip `user_plans.status`.
/// Flipping a plan to `expired` runs through the existing
/// `trg_enqueue_disconnect_on_plan_expiry` / `trg_notify_plan_expiry`
/// triggers (migrations.rs), so this loop only needs to call the two
/// durable-store functions and let the database do the rest.
async fn expire_plans_and_quotas_loop(state: AppState) {
    let mut ticker = tokio::time::interval(EXPIRY_SWEEP_INTERVAL);
    loop {
        ticker.tick().await;
        match durable_store::queries::expire_due_plans(state.db.pool()).await {
            Ok(usernames) if !usernames.is_empty() => {
                info!(count = usernames.len(), "expired due user plans");
            }
            Ok(_) => {}
            Err(err) => warn!(%err, "failed to expire due user plans"),
        }
        match durable_store::queries::enqueue_expired_quota_disconnects(state.db.pool()).await {
            Ok(usernames) if !usernames.is_empty() => {
                info!(count = usernames.len(), "enqueued period-end-reached quota disconnects");
            }
            Ok(_) => {}
            Err(err) => warn!(%err, "failed to enqueue period-end-reached quota disconnects"),
        }
    }
}

async fn notification_listener_task(listener: notification_listener::NotificationListener) {
    listener.run().await;
}

async fn disconnect_worker_task(worker: disconnect_worker::DisconnectWorker, notify_rx: mpsc::Receiver<()>) {
    worker.run(notify_rx).await;
}

/// Periodic full-fleet reconciliation sweep (§4.10), independent of the
/// immediate per-router sweep triggered on reconnect-after-gap.
async fn reconcile_fleet_loop(state: AppState) {
    let mut ticker = tokio::time::interval(RECONCILE_FLEET_INTERVAL);
    loop {
        ticker.tick().await;
        match state.reconciler.reconcile_fleet().await {
            Ok(outcomes) => info!(router_count = outcomes.len(), "fleet reconciliation sweep complete"),
            Err(err) => warn!(%err, "fleet reconciliation sweep failed"),
        }
    }
}

async fn register_ipc_handlers(server: &Arc<IpcServer>, state: AppState) {
    {
        server
            .register_handler(Method::Health, |req: Request| async move {
                Response::success(&req.id, serde_json::json!({"status": "ok", "version": env!("CARGO_PKG_VERSION")}))
            })
            .await;
    }
    {
        let state = state.clone();
        server
            .register_handler(Method::Status, move |req: Request| {
                let state = state.clone();
                async move {
                    Response::success(
                        &req.id,
                        serde_json::json!({
                            "instance_id": state.instance_id.to_string(),
                            "local_router_count": state.local_routers.len(),
                            "uptime_secs": state.started_at.elapsed().as_secs(),
                        }),
                    )
                }
            })
            .await;
    }
    {
        let shutdown_tx = server.shutdown_sender();
        server
            .register_handler(Method::Shutdown, move |req: Request| {
                let shutdown_tx = shutdown_tx.clone();
                async move {
                    let response = Response::success(&req.id, serde_json::json!({"shutting_down": true}));
                    let _ = shutdown_tx.send(());
                    response
                }
            })
            .await;
    }
    let _ = ipc::error_codes::INTERNAL_ERROR; // keep the error-code module linked for handlers added later
}

trait LogResult {
    fn map_log(self) -> impl std::future::Future<Output = ()>;
}

impl<F> LogResult for F
where
    F: std::future::Future<Output = dae_server::DaeServerResult<()>>,
{
    async fn map_log(self) {
        if let Err(err) = self.await {
            error!(%err, "dae server exited");
        }
    }
}
