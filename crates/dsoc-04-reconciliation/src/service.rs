//! Reconciliation Sweeper
//!
//! Walks the pending-reconciliation entries and asks the lifecycle engine to
//! repair each one from ledger state. Runs on demand (`run_once`) or as a
//! periodic task (`run`) that overlaps foreground operations.

use crate::domain::{CircuitBreaker, SweepEvent, SweepReport, SweepState};
use crate::error::{SweepError, SweepResult};
use crate::ports::inbound::SweepApi;
use async_trait::async_trait;
use dsoc_03_ticket_lifecycle::{PendingOutcome, TicketLifecycleApi};
use parking_lot::Mutex;
use shared_bus::{DsocEvent, EventPublisher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Sweep configuration
#[derive(Clone, Debug)]
pub struct SweepConfig {
    /// Pause between periodic sweeps
    pub interval_ms: u64,
    /// Entries examined this many times are dropped
    pub abandon_after_attempts: u32,
    /// Fully failed sweeps in a row before halting
    pub max_consecutive_failures: u32,
    /// Run the periodic sweep at all
    pub enabled: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_ms: 30_000,
            abandon_after_attempts: 20,
            max_consecutive_failures: 3,
            enabled: true,
        }
    }
}

impl SweepConfig {
    pub fn for_testing() -> Self {
        Self {
            interval_ms: 100,
            abandon_after_attempts: 3,
            ..Self::default()
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

/// Reconciliation Sweeper
pub struct ReconciliationSweeper<E: TicketLifecycleApi> {
    config: SweepConfig,
    engine: Arc<E>,
    breaker: Mutex<CircuitBreaker>,
    events: Option<Arc<dyn EventPublisher>>,
}

impl<E: TicketLifecycleApi> ReconciliationSweeper<E> {
    pub fn new(config: SweepConfig, engine: Arc<E>) -> Self {
        let breaker = CircuitBreaker::new(config.max_consecutive_failures);
        Self {
            config,
            engine,
            breaker: Mutex::new(breaker),
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    fn record(&self, event: SweepEvent) -> SweepState {
        let mut breaker = self.breaker.lock();
        let before = breaker.state();
        let after = breaker.process_event(event);
        if before != after {
            match after {
                SweepState::Halted => error!(
                    "[dsoc-04] sweeper halted after {} failed sweeps, manual reset required",
                    self.config.max_consecutive_failures
                ),
                SweepState::Degraded { failures } => {
                    warn!(failures, "[dsoc-04] sweeper degraded")
                }
                SweepState::Running => info!("[dsoc-04] sweeper running"),
            }
        }
        after
    }

    async fn sweep(&self) -> SweepResult<SweepReport> {
        let entries = self
            .engine
            .pending_reconciliations()
            .await
            .map_err(|e| SweepError::PendingUnavailable {
                reason: e.to_string(),
            })?;

        let mut report = SweepReport {
            examined: entries.len(),
            ..Default::default()
        };
        for entry in entries {
            let key = entry.key;
            if entry.attempts >= self.config.abandon_after_attempts {
                match self.engine.discard_pending(key).await {
                    Ok(()) => {
                        warn!(
                            %key,
                            attempts = entry.attempts,
                            "[dsoc-04] abandoning pending entry: {}",
                            entry.reason
                        );
                        report.abandoned += 1;
                    }
                    Err(e) => {
                        warn!(%key, "[dsoc-04] could not abandon entry: {}", e);
                        report.failed += 1;
                    }
                }
                continue;
            }

            match self.engine.reconcile_pending(entry).await {
                Ok(PendingOutcome::Repaired) => report.repaired += 1,
                Ok(PendingOutcome::StillPending { attempts }) => {
                    debug!(%key, attempts, "[dsoc-04] entry still pending");
                    report.still_pending += 1;
                }
                Err(e) => {
                    warn!(%key, "[dsoc-04] reconciliation failed: {}", e);
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Sweep every `interval` until `shutdown` flips to true. Ticks while
    /// halted are skipped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            interval_ms = self.config.interval_ms,
            "[dsoc-04] periodic sweep started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(_) => {}
                        Err(SweepError::Halted) => {
                            debug!("[dsoc-04] sweep skipped, sweeper halted");
                        }
                        Err(e) => error!("[dsoc-04] sweep failed: {}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("[dsoc-04] Shutdown signal received");
                        break;
                    }
                }
            }
        }
    }
}

#[async_trait]
impl<E: TicketLifecycleApi> SweepApi for ReconciliationSweeper<E> {
    async fn run_once(&self) -> SweepResult<SweepReport> {
        if self.breaker.lock().is_halted() {
            return Err(SweepError::Halted);
        }

        let report = match self.sweep().await {
            Ok(report) => report,
            Err(e) => {
                self.record(SweepEvent::SweepFailed);
                return Err(e);
            }
        };

        if report.is_total_failure() {
            self.record(SweepEvent::SweepFailed);
        } else {
            self.record(SweepEvent::SweepSucceeded);
        }
        if report.examined > 0 {
            info!(
                examined = report.examined,
                repaired = report.repaired,
                still_pending = report.still_pending,
                abandoned = report.abandoned,
                failed = report.failed,
                "[dsoc-04] sweep complete"
            );
        }
        if let Some(events) = &self.events {
            events
                .publish(DsocEvent::SweepCompleted {
                    examined: report.examined,
                    repaired: report.repaired,
                    still_pending: report.remaining(),
                })
                .await;
        }
        Ok(report)
    }

    fn state(&self) -> SweepState {
        self.breaker.lock().state()
    }

    fn reset(&self) -> SweepState {
        info!("[dsoc-04] manual reset");
        self.record(SweepEvent::ManualReset)
    }
}
