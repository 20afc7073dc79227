//! Sweep outcome

use serde::{Deserialize, Serialize};

/// Counts from one pass over the pending entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub examined: usize,
    /// Entries whose index state now matches the ledger
    pub repaired: usize,
    /// Submissions the ledger does not know yet
    pub still_pending: usize,
    /// Entries dropped after too many attempts
    pub abandoned: usize,
    /// Entries whose repair errored; retried next sweep
    pub failed: usize,
}

impl SweepReport {
    /// Every examined entry errored.
    pub fn is_total_failure(&self) -> bool {
        self.examined > 0 && self.failed == self.examined
    }

    /// Entries left for the next sweep.
    pub fn remaining(&self) -> usize {
        self.still_pending + self.failed
    }
}
