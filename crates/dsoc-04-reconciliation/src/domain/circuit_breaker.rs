//! Circuit breaker for the periodic sweep
//!
//! A sweep that fails on every entry (or cannot list entries at all) counts
//! as a failure. After `max_consecutive_failures` of them the periodic sweep
//! stops until an operator resets it.

use serde::{Deserialize, Serialize};

/// Sweeper state
///
/// ```text
/// [RUNNING] ──sweep failed──→ [DEGRADED {failures: 1}]
///     ↑                                │
///     │                                ├── sweep ok ──→ [RUNNING]
///     │                                │
///     │                                └── sweep failed ──→ [DEGRADED {failures: n+1}]
///     │                                                          │
///     │                                                          ↓
///     │                                            failures >= max? ──→ [HALTED]
///     │                                                                    │
///     └────────────────────── manual reset ────────────────────────────────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SweepState {
    #[default]
    Running,
    /// Recent sweeps failed; still sweeping
    Degraded { failures: u32 },
    /// Periodic sweeps suspended
    Halted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SweepEvent {
    SweepSucceeded,
    SweepFailed,
    ManualReset,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: SweepState,
    max_consecutive_failures: u32,
    reset_count: u64,
}

impl CircuitBreaker {
    pub fn new(max_consecutive_failures: u32) -> Self {
        Self {
            state: SweepState::Running,
            max_consecutive_failures: max_consecutive_failures.max(1),
            reset_count: 0,
        }
    }

    pub fn state(&self) -> SweepState {
        self.state
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.state, SweepState::Halted)
    }

    pub fn reset_count(&self) -> u64 {
        self.reset_count
    }

    pub fn process_event(&mut self, event: SweepEvent) -> SweepState {
        if event == SweepEvent::ManualReset {
            self.reset_count += 1;
        }
        self.state = self.next_state(event);
        self.state
    }

    fn next_state(&self, event: SweepEvent) -> SweepState {
        match (self.state, event) {
            (_, SweepEvent::ManualReset) => SweepState::Running,
            // Only a reset leaves Halted
            (SweepState::Halted, _) => SweepState::Halted,
            (_, SweepEvent::SweepSucceeded) => SweepState::Running,
            (SweepState::Running, SweepEvent::SweepFailed) => self.after_failures(1),
            (SweepState::Degraded { failures }, SweepEvent::SweepFailed) => {
                self.after_failures(failures.saturating_add(1))
            }
        }
    }

    fn after_failures(&self, failures: u32) -> SweepState {
        if failures >= self.max_consecutive_failures {
            SweepState::Halted
        } else {
            SweepState::Degraded { failures }
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(3)
    }
}
