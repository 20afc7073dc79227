//! # Shared Bus - Event Bus for Lifecycle Notifications
//!
//! Committed ledger transitions are announced here once the lifecycle engine
//! has projected them. Consumers (the runtime's audit log, tests, future
//! notification fan-out) subscribe with a topic filter.
//!
//! ```text
//! ┌──────────────────┐   publish()   ┌──────────────┐  subscribe()  ┌────────────┐
//! │ Lifecycle Engine │ ────────────→ │  Event Bus   │ ────────────→ │  Consumer  │
//! │ Reconciliation   │               │ (broadcast)  │               │            │
//! └──────────────────┘               └──────────────┘               └────────────┘
//! ```
//!
//! Publishing never influences the outcome of a lifecycle operation: an event
//! with no subscriber is dropped and logged.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{DsocEvent, EventFilter, EventTopic};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
