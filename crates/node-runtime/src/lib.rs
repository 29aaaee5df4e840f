//! # Node Runtime
//!
//! Wires one people relay process together. The `relay-node` binary is a
//! thin shell around [`NodeRuntime`].
//!
//! ```text
//!   HTTP (people-api) ──→ RequestGateway ──publish──→ InMemoryBroker
//!                               ↑                          │
//!                               │                   ev:request:*
//!                       success / failed                   ↓
//!                               └──────────────── WorkerRouter ──→ people-service
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Build broker, store and repository
//! 2. Seed the store from a file or URL (only when empty)
//! 3. Register the people handlers on the worker
//! 4. Start the timeout sweeper
//! 5. Serve HTTP until shutdown

pub mod config;

pub use config::{load_config, load_config_from, HttpConfig, NodeConfig};

use std::sync::Arc;

use anyhow::{Context, Result};
use people_api::AppState;
use people_service::{
    fetch_seed_url, load_seed_file, register_handlers, BootstrapOutcome, InMemoryStore,
    UserRepository,
};
use request_bridge::{RequestGateway, WorkerRouter};
use shared_bus::InMemoryBroker;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// The running relay: one broker shared by the gateway and the worker.
pub struct NodeRuntime {
    config: NodeConfig,
    broker: Arc<InMemoryBroker>,
    repository: Arc<UserRepository>,
    worker: WorkerRouter,
    gateway: Arc<RequestGateway>,
    sweeper: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl NodeRuntime {
    /// Build every component without starting background work.
    pub fn new(config: NodeConfig) -> Result<Self> {
        config
            .bridge
            .validate()
            .context("Invalid bridge configuration")?;

        info!("Creating people relay runtime");

        let broker = Arc::new(InMemoryBroker::with_capacity(config.bridge.channel_capacity));
        let repository = Arc::new(UserRepository::new(Arc::new(InMemoryStore::new())));
        let worker = WorkerRouter::new(broker.clone());
        let gateway = Arc::new(RequestGateway::from_config(broker.clone(), &config.bridge));
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            broker,
            repository,
            worker,
            gateway,
            sweeper: None,
            shutdown_tx,
        })
    }

    /// Seed the store, register handlers and start the sweeper.
    pub async fn start(&mut self) -> Result<()> {
        info!("===========================================");
        info!("  People Relay v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        self.initialize_seed().await?;

        register_handlers(&self.worker, Arc::clone(&self.repository))
            .await
            .context("Failed to register people handlers")?;

        self.sweeper = Some(self.gateway.spawn_sweeper(self.config.bridge.sweep_interval()));

        info!(
            events = ?self.worker.registered_events(),
            timeout_ms = self.config.bridge.default_timeout_ms,
            "Relay started"
        );
        Ok(())
    }

    async fn initialize_seed(&self) -> Result<()> {
        let users = match (&self.config.seed_file, &self.config.seed_url) {
            (Some(path), _) => load_seed_file(path).await?,
            (None, Some(url)) => fetch_seed_url(url).await?,
            (None, None) => {
                info!("No seed source configured, seeding an empty record set");
                Vec::new()
            }
        };

        match self.repository.bootstrap(users).await? {
            BootstrapOutcome::Seeded(count) => info!(count = count, "Seed data written"),
            BootstrapOutcome::AlreadyPresent => info!("Store already seeded"),
        }
        Ok(())
    }

    /// Serve HTTP until [`shutdown`](Self::shutdown) is called.
    pub async fn serve(&self) -> Result<()> {
        let addr = self
            .config
            .http
            .socket_addr()
            .with_context(|| format!("Invalid HTTP host '{}'", self.config.http.host))?;

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let shutdown = async move {
            // Closed sender also means shutdown.
            let _ = shutdown_rx.wait_for(|stop| *stop).await;
        };

        people_api::serve(addr, self.app_state(), shutdown)
            .await
            .context("HTTP server failed")
    }

    /// Stop the HTTP server, the worker and the sweeper.
    pub async fn shutdown(&mut self) {
        info!("Initiating graceful shutdown...");

        self.shutdown_tx.send_replace(true);
        self.worker.shutdown().await;

        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
            if let Err(e) = sweeper.await {
                if !e.is_cancelled() {
                    error!(error = %e, "Sweeper task failed");
                }
            }
        }

        let pending = self.gateway.table().pending_count();
        info!(
            pending = pending,
            published = self.broker.messages_published(),
            dropped = self.broker.messages_dropped(),
            "Shutdown complete"
        );
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(Arc::clone(&self.gateway))
    }

    pub fn gateway(&self) -> Arc<RequestGateway> {
        Arc::clone(&self.gateway)
    }

    pub fn repository(&self) -> Arc<UserRepository> {
        Arc::clone(&self.repository)
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }
}
