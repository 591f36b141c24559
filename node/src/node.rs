//! Node wiring: provider, store, repository and service, plus background tasks.

use std::sync::Arc;

use parking_lot::RwLock;
use ratedesk_common::{CurrencyPair, DurationExt};
use ratedesk_fx::store::SharedMemoryStore;
use ratedesk_fx::{
    CorridorRegistry, FxError, FxResult, KvRateRepository, MemoryStore, RateProvider, RateService,
    SimulatedProviderConfig, SimulatedRateProvider,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::config::NodeConfig;

/// Node lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Starting,
    Running,
    ShuttingDown,
    Stopped,
}

/// A running rate service node.
pub struct Node {
    config: NodeConfig,
    node_id: String,
    state: RwLock<NodeState>,
    service: Arc<RateService>,
    provider: Arc<SimulatedRateProvider>,
    store: SharedMemoryStore,
    shutdown_tx: watch::Sender<bool>,
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl Node {
    /// Build the node from configuration.
    pub fn new(config: NodeConfig, node_id: String) -> FxResult<Self> {
        let corridors = match &config.corridors_path {
            Some(path) => {
                let json = std::fs::read_to_string(path).map_err(|e| {
                    FxError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
                })?;
                CorridorRegistry::from_json(&json)?
            }
            None => CorridorRegistry::builtin()?,
        };

        let provider = Arc::new(SimulatedRateProvider::new(SimulatedProviderConfig {
            seed: config.seed,
            ..Default::default()
        })?);

        let store: SharedMemoryStore = Arc::new(MemoryStore::new());
        let repository = Arc::new(KvRateRepository::new(store.clone()));

        info!(
            corridors = corridors.len(),
            base_rates = provider.supported_pairs().len(),
            "Node components built"
        );

        let service = Arc::new(RateService::new(
            provider.clone(),
            repository,
            corridors,
            config.service.clone(),
        ));
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            node_id,
            state: RwLock::new(NodeState::Starting),
            service,
            provider,
            store,
            shutdown_tx,
            tasks: parking_lot::Mutex::new(Vec::new()),
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn state(&self) -> NodeState {
        *self.state.read()
    }

    pub fn service(&self) -> &Arc<RateService> {
        &self.service
    }

    pub fn provider(&self) -> &Arc<SimulatedRateProvider> {
        &self.provider
    }

    /// Start background tasks.
    #[instrument(skip(self), fields(node_id = %self.node_id))]
    pub async fn start(&self) -> FxResult<()> {
        self.service.health().await?;

        let mut tasks = Vec::new();

        let store = self.store.clone();
        let interval = self.config.reaper_interval;
        let shutdown = self.shutdown_tx.subscribe();
        tasks.push(tokio::spawn(async move {
            store.run_reaper(interval, shutdown).await;
        }));

        let store = self.store.clone();
        let interval = self.config.stats_interval;
        let mut shutdown = self.shutdown_tx.subscribe();
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.as_std());
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let stats = store.stats();
                        info!(
                            live = stats.live_entries,
                            expired = stats.expired_entries,
                            "Store statistics"
                        );
                    }
                    _ = shutdown.changed() => return,
                }
            }
        }));

        self.tasks.lock().extend(tasks);
        *self.state.write() = NodeState::Running;

        info!("Node started");
        Ok(())
    }

    /// Stream rates for `pairs` to the log until shutdown.
    pub fn spawn_stream(&self, pairs: Vec<CurrencyPair>, interval: Option<chrono::Duration>) {
        let (handle, mut rx) = self.service.subscribe(pairs, interval);
        let mut shutdown = self.shutdown_tx.subscribe();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    rate = rx.recv() => match rate {
                        Some(rate) => info!(
                            pair = %rate.pair(),
                            mid = %rate.mid(),
                            bid = %rate.rate.bid,
                            ask = %rate.rate.ask,
                            buy = %rate.buy_rate,
                            "Rate"
                        ),
                        None => {
                            warn!("Rate stream closed");
                            break;
                        }
                    },
                    _ = shutdown.changed() => break,
                }
            }
            handle.stop().await;
        });

        self.tasks.lock().push(task);
    }

    /// Stop background tasks and wait for them to exit.
    #[instrument(skip(self), fields(node_id = %self.node_id))]
    pub async fn stop(&self) {
        *self.state.write() = NodeState::ShuttingDown;
        let _ = self.shutdown_tx.send(true);

        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Background task failed");
            }
        }

        *self.state.write() = NodeState::Stopped;
        info!("Node stopped");
    }
}
