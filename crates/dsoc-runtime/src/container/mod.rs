//! # Service Container
//!
//! Configuration plus the wired component instances.

pub mod config;
pub mod services;

pub use config::{ConfigError, LedgerSection, RuntimeConfig, StorageBackend};
pub use services::{DsocContainer, RuntimeEngine, RuntimeSweeper};
