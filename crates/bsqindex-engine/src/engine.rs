//! Engine lifecycle: initial load, background tasks, shutdown.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use bsqindex_core::config::EngineConfig;
use bsqindex_core::error::DumpError;
use bsqindex_core::loader::{LoadSummary, SnapshotLoader};
use bsqindex_core::pool::DecodePool;
use bsqindex_core::price::PriceFeed;
use bsqindex_core::query::QuerySurface;
use bsqindex_core::snapshot::SnapshotStore;
use bsqindex_price::{HttpTradeSource, PricePoller};

use crate::error::EngineError;
use crate::supervisor::{Command, ReloadEvent, Supervisor};

/// A running indexer over one producer data directory.
///
/// Dropping the handle stops the background tasks; [`Engine::stop`] also
/// waits for them.
pub struct Engine {
    config: EngineConfig,
    query: QuerySurface,
    initial_load: Option<LoadSummary>,
    commands: mpsc::Sender<Command>,
    reloads: broadcast::Sender<ReloadEvent>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Engine {
    /// Load the dump, then start the reload supervisor and (if configured)
    /// the price poller.
    ///
    /// Fails if the dump file doesn't exist. Any other initial load failure
    /// is logged and an empty snapshot is served until the next reload.
    pub async fn start(config: EngineConfig) -> Result<Self, EngineError> {
        let layout = config.layout();
        if !layout.dump_file.is_file() {
            return Err(DumpError::DumpMissing {
                path: layout.dump_file,
            }
            .into());
        }

        let pool = Arc::new(DecodePool::new(config.decode_workers)?);
        let store = Arc::new(SnapshotStore::default());
        let loader = SnapshotLoader::new(layout.dump_file.clone(), pool, Arc::clone(&store));

        let initial_load = match loader.reload().await {
            Ok(summary) => Some(summary),
            Err(e) if e.is_missing() => return Err(e.into()),
            Err(e) => {
                tracing::error!(error = %e, "Initial load failed, serving an empty snapshot");
                None
            }
        };

        let price_feed = Arc::new(match &config.price {
            Some(price) => PriceFeed::new(price.channel_capacity),
            None => PriceFeed::default(),
        });

        let capacity = config.channel_capacity.max(1);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (reloads, _) = broadcast::channel(capacity);
        let (commands, commands_rx) = mpsc::channel(capacity);

        let mut tasks = Vec::with_capacity(2);
        let supervisor = Supervisor::new(&config, loader, commands_rx, reloads.clone());
        tasks.push(tokio::spawn(supervisor.run(shutdown_rx.clone())));

        if let Some(price) = &config.price {
            let source = HttpTradeSource::new(price.trades_url.clone(), price.request_timeout())?;
            let poller = PricePoller::new(
                source,
                Arc::clone(&price_feed),
                price.poll_interval(),
                price.price_scale,
            );
            tasks.push(tokio::spawn(poller.run(shutdown_rx)));
        }

        tracing::info!(
            data_dir = %config.data_dir.display(),
            height = store.current().latest_height(),
            price = config.price.is_some(),
            "Engine started"
        );

        Ok(Self {
            query: QuerySurface::new(store, price_feed),
            config,
            initial_load,
            commands,
            reloads,
            shutdown,
            tasks,
        })
    }

    /// Read-only view over the live snapshot and price.
    pub fn query(&self) -> QuerySurface {
        self.query.clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Summary of the load done by [`Engine::start`], if it succeeded.
    pub fn initial_load(&self) -> Option<LoadSummary> {
        self.initial_load
    }

    /// Report the ledger's current height. If it runs too far ahead of the
    /// dump the watchers are re-armed and a reload is forced.
    pub fn notify_ledger_height(&self, height: u64) -> Result<(), EngineError> {
        match self.commands.try_send(Command::LedgerHeight(height)) {
            Ok(()) => Ok(()),
            // A full queue already has a height check pending.
            Err(mpsc::error::TrySendError::Full(_)) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(EngineError::Stopped),
        }
    }

    /// Reload now, bypassing the debounce. Coalesces with a running reload.
    pub async fn reload_now(&self) -> Result<(), EngineError> {
        self.commands
            .send(Command::Reload)
            .await
            .map_err(|_| EngineError::Stopped)
    }

    /// Outcomes of every reload from now on.
    pub fn subscribe_reloads(&self) -> broadcast::Receiver<ReloadEvent> {
        self.reloads.subscribe()
    }

    /// Stop watching and polling and wait for the background tasks.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Background task ended abnormally");
            }
        }
        tracing::info!("Engine stopped");
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("data_dir", &self.config.data_dir)
            .field("latest_height", &self.query.latest_height())
            .field("tasks", &self.tasks.len())
            .finish()
    }
}
