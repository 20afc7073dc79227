//! Adapters for the Index Store

pub mod flaky;
pub mod memory;
#[cfg(feature = "rocksdb")]
pub mod rocksdb;

pub use flaky::FlakyIndexStore;
pub use memory::InMemoryIndexStore;
#[cfg(feature = "rocksdb")]
pub use self::rocksdb::{RocksDbIndexConfig, RocksDbIndexStore};
