//! Stake and reward accounting
//!
//! On approval the full stake is converted into reward tokens; on rejection
//! it is refunded and nothing is minted. Distributions only decide who gets
//! what share; every plan they produce totals exactly `stake_amount`.

use crate::error::{LifecycleError, LifecycleResult};
use dsoc_01_ledger_client::{RewardPlan, RewardShare};
use shared_types::{Address, Amount, LedgerTicket, RewardKind};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Basis points in a whole.
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Splits an approved ticket's stake into reward shares.
pub trait RewardDistribution: Send + Sync + fmt::Debug {
    /// Plan for approving `ticket`, validated by `validator`.
    fn plan(&self, ticket: &LedgerTicket, validator: Address) -> RewardPlan;
}

/// Plan for a validation outcome. Rejections mint nothing.
pub fn settlement_plan(
    distribution: &dyn RewardDistribution,
    ticket: &LedgerTicket,
    validator: Address,
    approved: bool,
) -> RewardPlan {
    if approved {
        distribution.plan(ticket, validator)
    } else {
        RewardPlan::none()
    }
}

/// The assigned analyst receives the whole stake.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleBeneficiary;

impl RewardDistribution for SingleBeneficiary {
    fn plan(&self, ticket: &LedgerTicket, _validator: Address) -> RewardPlan {
        let owner = ticket.analyst.unwrap_or(ticket.client);
        RewardPlan::single(owner, ticket.stake_amount, RewardKind::Analysis)
    }
}

/// Analyst, validator and platform shares in basis points. Rounding
/// remainders go to the analyst.
#[derive(Debug, Clone)]
pub struct WeightedSplit {
    analyst_bps: u32,
    certifier_bps: u32,
    platform: Address,
}

impl WeightedSplit {
    pub fn new(analyst_bps: u32, certifier_bps: u32, platform: Address) -> LifecycleResult<Self> {
        let total = analyst_bps.checked_add(certifier_bps);
        if total.map_or(true, |t| t > BPS_DENOMINATOR) {
            return Err(LifecycleError::InvalidConfig {
                reason: format!(
                    "weighted split {analyst_bps}+{certifier_bps} exceeds {BPS_DENOMINATOR} bps"
                ),
            });
        }
        Ok(Self {
            analyst_bps,
            certifier_bps,
            platform,
        })
    }

    /// 80% analyst, 10% validator, 10% platform.
    pub fn standard(platform: Address) -> Self {
        Self {
            analyst_bps: 8_000,
            certifier_bps: 1_000,
            platform,
        }
    }

    fn platform_bps(&self) -> u32 {
        BPS_DENOMINATOR - self.analyst_bps - self.certifier_bps
    }
}

fn share_of(amount: Amount, bps: u32) -> Amount {
    // bps <= 10_000, so the quotient never exceeds `amount`
    ((amount as u128 * bps as u128) / BPS_DENOMINATOR as u128) as Amount
}

impl RewardDistribution for WeightedSplit {
    fn plan(&self, ticket: &LedgerTicket, validator: Address) -> RewardPlan {
        let stake = ticket.stake_amount;
        let certifier = share_of(stake, self.certifier_bps);
        let platform = share_of(stake, self.platform_bps());
        let analyst = stake - certifier - platform;

        let shares = [
            (ticket.analyst.unwrap_or(ticket.client), analyst, RewardKind::Analysis),
            (validator, certifier, RewardKind::Certification),
            (self.platform, platform, RewardKind::Platform),
        ];
        RewardPlan {
            shares: shares
                .into_iter()
                .filter(|(_, amount, _)| *amount > 0)
                .map(|(owner, amount, kind)| RewardShare {
                    owner,
                    amount,
                    kind,
                })
                .collect(),
        }
    }
}

/// Distribution named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistributionKind {
    #[default]
    Single,
    Weighted {
        analyst_bps: u32,
        certifier_bps: u32,
    },
}

impl DistributionKind {
    pub fn build(self, platform: Address) -> LifecycleResult<Arc<dyn RewardDistribution>> {
        let distribution: Arc<dyn RewardDistribution> = match self {
            DistributionKind::Single => Arc::new(SingleBeneficiary),
            DistributionKind::Weighted {
                analyst_bps,
                certifier_bps,
            } => Arc::new(WeightedSplit::new(analyst_bps, certifier_bps, platform)?),
        };
        Ok(distribution)
    }
}

impl FromStr for DistributionKind {
    type Err = LifecycleError;

    /// `single` or `weighted:<analyst_bps>,<certifier_bps>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LifecycleError::InvalidConfig {
            reason: format!("unknown distribution '{s}'"),
        };
        let s = s.trim();
        if s.eq_ignore_ascii_case("single") {
            return Ok(DistributionKind::Single);
        }
        let weights = s.strip_prefix("weighted:").ok_or_else(invalid)?;
        let (analyst, certifier) = weights.split_once(',').ok_or_else(invalid)?;
        let analyst_bps = analyst.trim().parse().map_err(|_| invalid())?;
        let certifier_bps = certifier.trim().parse().map_err(|_| invalid())?;
        Ok(DistributionKind::Weighted {
            analyst_bps,
            certifier_bps,
        })
    }
}
