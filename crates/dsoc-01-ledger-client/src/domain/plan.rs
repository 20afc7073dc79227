//! Reward plan submitted with a validation.
//!
//! The plan is computed off-ledger by the lifecycle engine's distribution
//! function. The ledger only checks that it conserves the stake.

use serde::{Deserialize, Serialize};
use shared_types::{Address, Amount, RewardKind};

/// One beneficiary of an approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardShare {
    pub owner: Address,
    pub amount: Amount,
    pub kind: RewardKind,
}

/// Reward tokens to mint when a ticket is approved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardPlan {
    pub shares: Vec<RewardShare>,
}

impl RewardPlan {
    /// Plan for a rejection: nothing is minted.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn single(owner: Address, amount: Amount, kind: RewardKind) -> Self {
        Self {
            shares: vec![RewardShare {
                owner,
                amount,
                kind,
            }],
        }
    }

    /// Total value the plan mints. Saturates instead of overflowing.
    pub fn total(&self) -> Amount {
        self.shares
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(s.amount))
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }
}
