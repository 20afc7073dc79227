//! # Runtime Configuration
//!
//! Unified configuration for the engine, the sweeper and storage.
//!
//! ## Environment Overrides
//!
//! | Variable | Field |
//! |----------|-------|
//! | `DSOC_LEDGER_TIMEOUT_MS` | `engine.ledger_timeout_ms` |
//! | `DSOC_LEDGER_MAX_ATTEMPTS` | `engine.ledger_max_attempts` |
//! | `DSOC_VALIDATOR_POLICY` | `engine.validator_policy` (`certifier` / `client`) |
//! | `DSOC_DISTRIBUTION` | `engine.distribution` (`single` / `weighted:a,c`) |
//! | `DSOC_PLATFORM_ADDRESS` | `engine.platform_address` |
//! | `DSOC_SWEEP_INTERVAL_MS` | `sweep.interval_ms` |
//! | `DSOC_SWEEP_ABANDON_AFTER` | `sweep.abandon_after_attempts` |
//! | `DSOC_SWEEP_MAX_FAILURES` | `sweep.max_consecutive_failures` |
//! | `DSOC_SWEEP_ENABLED` | `sweep.enabled` |
//! | `DSOC_STORAGE` | `storage` (`memory` / `rocksdb`) |
//! | `DSOC_DATA_DIR` | RocksDB path |
//! | `DSOC_FIRST_TICKET_ID` | `ledger.first_ticket_id` |
//! | `DSOC_CERTIFIERS` | comma-separated hex addresses |

use std::path::PathBuf;
use std::str::FromStr;

use dsoc_03_ticket_lifecycle::{DistributionKind, EngineConfig};
use dsoc_04_reconciliation::SweepConfig;
use shared_types::{Address, TicketId};
use thiserror::Error;

/// Complete runtime configuration.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// Lifecycle engine configuration.
    pub engine: EngineConfig,
    /// Reconciliation sweep configuration.
    pub sweep: SweepConfig,
    /// Index storage backend.
    pub storage: StorageBackend,
    /// Ledger configuration.
    pub ledger: LedgerSection,
    /// Addresses registered as certifiers on startup.
    pub certifiers: Vec<Address>,
}

/// Index storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    Memory,
    /// Requires the `rocksdb` feature.
    RocksDb { path: PathBuf },
}

/// Ledger configuration.
#[derive(Debug, Clone)]
pub struct LedgerSection {
    /// Id given to the first ticket.
    pub first_ticket_id: TicketId,
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self { first_ticket_id: 1 }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    #[error("{key}: cannot parse '{value}'")]
    InvalidValue { key: &'static str, value: String },

    /// A field holds a value the runtime cannot use.
    #[error("{field}: {reason}")]
    OutOfRange { field: &'static str, reason: String },

    /// RocksDB storage selected in a build without it.
    #[error("RocksDB storage requested but the `rocksdb` feature is not enabled")]
    RocksDbUnavailable,
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

impl RuntimeConfig {
    /// Defaults overridden from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `DSOC_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DSOC_LEDGER_TIMEOUT_MS") {
            self.engine.ledger_timeout_ms = parse("DSOC_LEDGER_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("DSOC_LEDGER_MAX_ATTEMPTS") {
            self.engine.ledger_max_attempts = parse("DSOC_LEDGER_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("DSOC_VALIDATOR_POLICY") {
            self.engine.validator_policy = parse("DSOC_VALIDATOR_POLICY", &v)?;
        }
        if let Some(v) = lookup("DSOC_DISTRIBUTION") {
            self.engine.distribution =
                DistributionKind::from_str(&v).map_err(|_| ConfigError::InvalidValue {
                    key: "DSOC_DISTRIBUTION",
                    value: v.clone(),
                })?;
        }
        if let Some(v) = lookup("DSOC_PLATFORM_ADDRESS") {
            self.engine.platform_address = parse("DSOC_PLATFORM_ADDRESS", &v)?;
        }

        if let Some(v) = lookup("DSOC_SWEEP_INTERVAL_MS") {
            self.sweep.interval_ms = parse("DSOC_SWEEP_INTERVAL_MS", &v)?;
        }
        if let Some(v) = lookup("DSOC_SWEEP_ABANDON_AFTER") {
            self.sweep.abandon_after_attempts = parse("DSOC_SWEEP_ABANDON_AFTER", &v)?;
        }
        if let Some(v) = lookup("DSOC_SWEEP_MAX_FAILURES") {
            self.sweep.max_consecutive_failures = parse("DSOC_SWEEP_MAX_FAILURES", &v)?;
        }
        if let Some(v) = lookup("DSOC_SWEEP_ENABLED") {
            self.sweep.enabled = parse("DSOC_SWEEP_ENABLED", &v)?;
        }

        if let Some(v) = lookup("DSOC_STORAGE") {
            self.storage = match v.trim().to_ascii_lowercase().as_str() {
                "memory" => StorageBackend::Memory,
                "rocksdb" => StorageBackend::RocksDb {
                    path: lookup("DSOC_DATA_DIR")
                        .map(PathBuf::from)
                        .unwrap_or_else(|| PathBuf::from("./data/index")),
                },
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "DSOC_STORAGE",
                        value: v,
                    })
                }
            };
        }

        if let Some(v) = lookup("DSOC_FIRST_TICKET_ID") {
            self.ledger.first_ticket_id = parse("DSOC_FIRST_TICKET_ID", &v)?;
        }
        if let Some(v) = lookup("DSOC_CERTIFIERS") {
            self.certifiers = v
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| parse("DSOC_CERTIFIERS", s))
                .collect::<Result<Vec<Address>, ConfigError>>()?;
        }
        Ok(())
    }

    /// Reject values the runtime cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.ledger_timeout_ms == 0 {
            return Err(ConfigError::OutOfRange {
                field: "engine.ledger_timeout_ms",
                reason: "must be positive".into(),
            });
        }
        if self.engine.ledger_max_attempts == 0 {
            return Err(ConfigError::OutOfRange {
                field: "engine.ledger_max_attempts",
                reason: "at least one attempt is required".into(),
            });
        }
        if let Err(e) = self
            .engine
            .distribution
            .build(self.engine.platform_address)
        {
            return Err(ConfigError::OutOfRange {
                field: "engine.distribution",
                reason: e.to_string(),
            });
        }
        if self.sweep.enabled && self.sweep.interval_ms == 0 {
            return Err(ConfigError::OutOfRange {
                field: "sweep.interval_ms",
                reason: "must be positive while the sweep is enabled".into(),
            });
        }
        if self.sweep.max_consecutive_failures == 0 {
            return Err(ConfigError::OutOfRange {
                field: "sweep.max_consecutive_failures",
                reason: "must be positive".into(),
            });
        }
        if matches!(self.storage, StorageBackend::RocksDb { .. }) && !cfg!(feature = "rocksdb") {
            return Err(ConfigError::RocksDbUnavailable);
        }
        Ok(())
    }
}
