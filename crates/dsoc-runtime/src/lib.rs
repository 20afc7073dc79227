//! # dSOC Runtime Library
//!
//! Exposes the runtime modules for testing. The entry point is the
//! `main.rs` binary.
//!
//! - `container/` - configuration and component wiring
//! - `handlers/` - event bus subscribers
//! - `runtime` - background task lifecycle

pub mod container;
pub mod handlers;
pub mod runtime;

pub use container::{ConfigError, DsocContainer, RuntimeConfig, StorageBackend};
pub use runtime::DsocRuntime;
