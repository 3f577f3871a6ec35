//! Wires every core component into one running instance (§3 Ownership
//! summary, §9 Design Notes: "each is a long-lived task with an input
//! channel"). Built once at startup and shared (by clone or reference)
//! with every spawned task and IPC handler.

use coa_client::CoaClient;
use control_config::Config;
use control_core::InstanceId;
use dae_server::{DaeServer, DaeServerConfig};
use disconnect_worker::{DisconnectWorker, WorkerConfig};
use durable_store::Database;
use message_bus::MessageBus;
use notification_listener::NotificationListener;
use quota_manager::QuotaManager;
use router_endpoint::{EndpointConfig, LocalRouters, RouterDispatch, RouterEndpoint, RouterEvent};
use rpc_manager::CommandManager;
use session_reconciler::SessionReconciler;
use status_aggregator::StatusAggregator;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tunnel_manager::TunnelManager;
use ttl_store::{ConnectionRegistry, SessionCounters, TtlStore};

/// Every long-lived component one control-plane instance owns, assembled
/// in dependency order at startup. `Clone` is cheap: every field is
/// itself a handle (connection pool, dashmap-backed table, or similar).
#[derive(Clone)]
pub struct AppState {
    pub instance_id: InstanceId,
    pub config: Config,
    pub db: Database,
    pub registry: ConnectionRegistry,
    pub bus: MessageBus,
    pub local_routers: LocalRouters,
    pub dispatch: RouterDispatch,
    pub endpoint: RouterEndpoint,
    pub rpc: CommandManager,
    pub tunnels: TunnelManager,
    pub quota: QuotaManager,
    pub reconciler: SessionReconciler,
    pub status: StatusAggregator,
    pub started_at: Instant,
}

/// The pieces `build` hands back that can't live behind `AppState`'s
/// `Clone` bound (owned sockets, receivers) alongside the state itself.
pub struct Components {
    pub state: AppState,
    pub router_events_rx: mpsc::Receiver<RouterEvent>,
    pub dae_server: DaeServer,
    pub disconnect_worker: DisconnectWorker,
    pub disconnect_signal_rx: mpsc::Receiver<()>,
    pub notification_listener: NotificationListener,
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("durable store connection failed: {0}")]
    Database(#[from] durable_store::DurableStoreError),
    #[error("ttl store connection failed: {0}")]
    TtlStore(#[from] ttl_store::TtlStoreError),
    #[error("message bus connection failed: {0}")]
    Bus(#[from] message_bus::BusError),
}

/// Assembles every component in dependency order: stores first, then the
/// dispatch primitives every manager shares, then the managers themselves.
pub async fn build(config: Config) -> Result<Components, BuildError> {
    let instance_id = config
        .instance_id
        .clone()
        .map(InstanceId::new)
        .unwrap_or_else(InstanceId::generate);

    let db = Database::connect(&config.database_url, 10).await?;
    let ttl_store = TtlStore::connect(&config.ttl_store_url).await?;
    let registry = ConnectionRegistry::new(ttl_store.clone());
    let counters = SessionCounters::new(ttl_store.clone());
    let bus = MessageBus::connect(&config.ttl_store_url).await?;

    let local_routers = LocalRouters::new();
    let dispatch = RouterDispatch::new(registry.clone(), local_routers.clone(), bus.clone());

    let rpc = CommandManager::new(instance_id.to_string(), dispatch.clone(), bus.clone());
    let tunnels = TunnelManager::new(dispatch.clone(), registry.clone(), bus.clone());
    let quota = QuotaManager::new(db.clone(), registry.clone(), rpc.clone());
    let reconciler = SessionReconciler::new(db.clone(), rpc.clone(), quota.clone());
    let status = StatusAggregator::new(db.clone(), registry.clone());
    let coa = CoaClient::new();

    let (disconnect_signal_tx, disconnect_signal_rx) = mpsc::channel(1);
    let notification_listener = NotificationListener::new(db.clone(), counters, quota.clone(), disconnect_signal_tx);

    let endpoint_config = EndpointConfig {
        instance_id: instance_id.to_string(),
        ping_interval: Duration::from_secs(config.ping_interval_secs),
        pong_timeout: Duration::from_secs(config.pong_timeout_secs),
        ..EndpointConfig::default()
    };
    let (router_events_tx, router_events_rx) = mpsc::channel(1024);
    let endpoint = RouterEndpoint::new(
        db.clone(),
        registry.clone(),
        local_routers.clone(),
        dispatch.clone(),
        router_events_tx,
        endpoint_config,
    );

    let dae_server = DaeServer::new(
        db.clone(),
        DaeServerConfig {
            bind_addr: format!("0.0.0.0:{}", config.coa_port)
                .parse()
                .expect("coa_port forms a valid bind address"),
            ..DaeServerConfig::default()
        },
    );

    let worker_config = WorkerConfig {
        batch_size: config.disconnect_batch_size as i64,
        ..WorkerConfig::default()
    };
    let disconnect_worker = DisconnectWorker::new(db.clone(), registry.clone(), coa, worker_config);

    let state = AppState {
        instance_id,
        config,
        db,
        registry,
        bus,
        local_routers,
        dispatch,
        endpoint,
        rpc,
        tunnels,
        quota,
        reconciler,
        status,
        started_at: Instant::now(),
    };

    Ok(Components {
        state,
        router_events_rx,
        dae_server,
        disconnect_worker,
        disconnect_signal_rx,
        notification_listener,
    })
}
