//! # Event Handlers
//!
//! Bus subscribers spawned by the runtime.

pub mod event_log;

pub use event_log::EventLogHandler;
