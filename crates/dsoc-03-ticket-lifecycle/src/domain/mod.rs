//! Domain logic for the Ticket Lifecycle Engine

pub mod accounting;
pub mod intent;
pub mod retry;
pub mod state_machine;

pub use accounting::{
    settlement_plan, DistributionKind, RewardDistribution, SingleBeneficiary, WeightedSplit,
};
pub use intent::Intent;
pub use retry::{compute_delay, RetryConfig};
pub use state_machine::precheck;
