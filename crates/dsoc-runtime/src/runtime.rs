//! # Runtime Lifecycle
//!
//! Starts the background tasks of a [`DsocContainer`] and stops them on
//! shutdown.
//!
//! ## Startup Sequence
//!
//! 1. Spawn the event log handler
//! 2. Spawn the periodic reconciliation sweep (if enabled)
//! 3. Signal ready

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use dsoc_02_index_store::IndexStore;
use shared_bus::EventFilter;

use crate::container::DsocContainer;
use crate::handlers::EventLogHandler;

/// Longest wait for background tasks after the shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// The runtime owning the container and its background tasks.
pub struct DsocRuntime<S: IndexStore + 'static> {
    container: Arc<DsocContainer<S>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl<S: IndexStore + 'static> DsocRuntime<S> {
    pub fn new(container: DsocContainer<S>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            container: Arc::new(container),
            shutdown_tx,
            shutdown_rx,
            tasks: Vec::new(),
        }
    }

    /// Spawn the background tasks.
    pub fn start(&mut self) {
        info!("===========================================");
        info!("  dSOC Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        let handler = EventLogHandler::new(self.container.event_bus.subscribe(EventFilter::all()));
        let mut log_shutdown = self.shutdown_rx.clone();
        self.tasks.push(tokio::spawn(async move {
            tokio::select! {
                _ = handler.run() => {}
                _ = log_shutdown.changed() => {
                    info!("[dsoc-runtime] Shutdown signal received");
                }
            }
        }));

        if self.container.config.sweep.enabled {
            let sweeper = Arc::clone(&self.container.sweeper);
            let sweep_shutdown = self.shutdown_rx.clone();
            self.tasks.push(tokio::spawn(async move {
                sweeper.run(sweep_shutdown).await;
            }));
        } else {
            warn!("[dsoc-04] periodic sweep disabled, pending entries only repaired on demand");
        }

        info!("All components initialized and running");
    }

    /// Signal shutdown and wait for the background tasks.
    pub async fn shutdown(&mut self) {
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }

        for task in self.tasks.drain(..) {
            match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Background task failed: {}", e),
                Err(_) => warn!("Background task did not stop within {:?}", SHUTDOWN_GRACE),
            }
        }

        info!("Shutdown complete");
    }

    pub fn container(&self) -> Arc<DsocContainer<S>> {
        Arc::clone(&self.container)
    }

    pub fn is_running(&self) -> bool {
        !self.tasks.is_empty()
    }
}
