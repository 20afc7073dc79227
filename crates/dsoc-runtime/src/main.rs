//! # dSOC Runtime
//!
//! Entry point: loads configuration, opens the index backend, wires the
//! components and runs until Ctrl+C.
//!
//! ## Startup Sequence
//!
//! 1. Install the tracing subscriber (`RUST_LOG`, default `info`)
//! 2. Load configuration from the environment and validate it
//! 3. Open the index store selected by `DSOC_STORAGE`
//! 4. Build the container and start background tasks
//! 5. Wait for Ctrl+C, then shut down gracefully

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use dsoc_02_index_store::{InMemoryIndexStore, IndexStore};
use dsoc_runtime::{DsocContainer, DsocRuntime, RuntimeConfig, StorageBackend};
use shared_types::ValidatorPolicy;

async fn serve<S: IndexStore + 'static>(config: RuntimeConfig, index: Arc<S>) -> Result<()> {
    let container = DsocContainer::build(config, index)
        .await
        .context("Failed to build service container")?;

    let mut runtime = DsocRuntime::new(container);
    runtime.start();

    info!("dSOC runtime is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    runtime.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = RuntimeConfig::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    if config.engine.validator_policy == ValidatorPolicy::Certifier && config.certifiers.is_empty()
    {
        warn!("No certifiers configured; submitted tickets cannot be validated");
    }

    match config.storage.clone() {
        StorageBackend::Memory => {
            info!("Using in-memory index store");
            serve(config, Arc::new(InMemoryIndexStore::new())).await
        }
        #[cfg(feature = "rocksdb")]
        StorageBackend::RocksDb { path } => {
            use dsoc_02_index_store::{RocksDbIndexConfig, RocksDbIndexStore};

            info!("Using RocksDB index store at {:?}", path);
            let store = RocksDbIndexStore::open(RocksDbIndexConfig {
                path: path.to_string_lossy().into_owned(),
                ..Default::default()
            })
            .context("Failed to open RocksDB index store")?;
            serve(config, Arc::new(store)).await
        }
        #[cfg(not(feature = "rocksdb"))]
        StorageBackend::RocksDb { .. } => {
            anyhow::bail!("RocksDB storage requires the `rocksdb` feature")
        }
    }
}
