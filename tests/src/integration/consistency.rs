//! # Consistency Tests
//!
//! The dual-write protocol under injected faults:
//!
//! - the index never shows a state the ledger has not committed
//! - failed projections and unknown submissions converge after a sweep
//! - a timed-out submission that lands late is found, not duplicated
//! - a divergence recorded while a sweep repairs the same ticket survives
//! - an out-of-order index write never replaces a newer projection
//! - the sweep circuit breaker halts after repeated failures and resets

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::integration::fixtures::*;

    use dsoc_01_ledger_client::{LedgerClient, LedgerFault, TxContext};
    use dsoc_02_index_store::{IndexStore, PendingKey, PendingReconciliation, WriteOutcome};
    use dsoc_03_ticket_lifecycle::{
        Applied, CommitState, LifecycleError, LifecycleResult, SubmissionStatus,
        TicketLifecycleApi,
    };
    use dsoc_04_reconciliation::{SweepApi, SweepError, SweepState};
    use shared_bus::{DsocEvent, EventFilter};
    use shared_types::{Digest, TicketId, TicketStatus};

    // =========================================================================
    // LEDGER AHEAD OF INDEX
    // =========================================================================

    /// Run one step, check the index is not ahead, and repair it if the
    /// projection was lost.
    async fn checked(harness: &Harness, step: LifecycleResult<Applied>) {
        let applied = step.unwrap();
        harness.assert_ledger_ahead().await;
        if !applied.is_fresh() {
            harness.index().fail_next_projections(0);
            let report = harness.sweeper.run_once().await.unwrap();
            assert_eq!(report.repaired, 1);
            harness.assert_converged().await;
        }
    }

    #[tokio::test]
    async fn test_ledger_ahead_under_random_index_faults() {
        let harness = Harness::new();
        let mut rng = StdRng::seed_from_u64(0x05_0C);

        for n in 0..10u32 {
            let worker = analyst(&format!("worker-{n}"));
            let mut inject = || {
                let failures = if rng.gen_bool(0.4) { 100 } else { 0 };
                harness.index().fail_next_projections(failures);
            };

            inject();
            let token = harness.stake(client(), 100 + u64::from(n)).await;
            harness.index().fail_next_projections(0);
            harness.sweeper.run_once().await.unwrap();

            inject();
            let created = harness.create(client(), token).await;
            let ticket_id = created.as_ref().ok().and_then(Applied::ticket_id);
            checked(&harness, created).await;
            let ticket_id = ticket_id.unwrap();

            inject();
            checked(&harness, harness.claim(worker, ticket_id).await).await;
            inject();
            checked(&harness, harness.submit(worker, ticket_id).await).await;
            inject();
            checked(
                &harness,
                harness.validate(certifier(), ticket_id, n % 2 == 0).await,
            )
            .await;
        }

        harness.assert_converged().await;
        assert!(harness.engine.pending_reconciliations().await.unwrap().is_empty());
        let balances = harness.index().balances(client()).await.unwrap();
        assert_eq!(balances.stake_available, 0);
        assert_eq!(balances.stake_locked, 0);
    }

    // =========================================================================
    // CONVERGENCE
    // =========================================================================

    #[tokio::test]
    async fn test_convergence_after_index_outage() {
        let harness = Harness::new();
        let ticket_id = harness.open_ticket(500).await;

        harness.index().set_unavailable(true);
        let applied = harness.claim(analyst("a"), ticket_id).await.unwrap();
        assert!(!applied.is_fresh());
        assert_eq!(harness.engine.backlog_len(), 1);

        // Still down: the sweep cannot repair anything
        let report = harness.sweeper.run_once().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(harness.sweeper.state(), SweepState::Degraded { failures: 1 });

        harness.index().set_unavailable(false);
        let report = harness.sweeper.run_once().await.unwrap();
        assert_eq!(report.repaired, 1);
        assert_eq!(harness.sweeper.state(), SweepState::Running);
        assert_eq!(harness.engine.backlog_len(), 0);

        let snapshot = harness.engine.get_snapshot(ticket_id).await.unwrap().unwrap();
        assert_eq!(snapshot.status(), TicketStatus::Claimed);
        assert_eq!(snapshot.metadata.title, "Credential stuffing");
        harness.assert_converged().await;
    }

    #[tokio::test]
    async fn test_reconcile_publishes_event() {
        let harness = Harness::new();
        let mut events = harness.bus.subscribe(EventFilter::all());
        let ticket_id = harness.open_ticket(500).await;

        harness.index().fail_next_projections(100);
        harness.claim(analyst("a"), ticket_id).await.unwrap();
        harness.index().fail_next_projections(0);
        harness.engine.reconcile(ticket_id).await.unwrap();

        let seen = events.drain();
        assert!(seen
            .iter()
            .any(|e| matches!(e, DsocEvent::ProjectionStale { .. })));
        assert!(seen.iter().any(|e| matches!(
            e,
            DsocEvent::Reconciled { ticket_id: id, .. } if *id == ticket_id
        )));
        assert!(harness.engine.pending_reconciliations().await.unwrap().is_empty());
    }

    // =========================================================================
    // SUBMISSION OUTCOMES
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_late_landing_creation_recovered() {
        let harness = Harness::new();
        let token = harness.stake(client(), 500).await;
        for _ in 0..3 {
            harness
                .faults()
                .inject(LedgerFault::Delay(Duration::from_secs(1)));
        }

        let err = harness.create(client(), token).await.unwrap_err();
        let LifecycleError::LedgerTimeout {
            submission_id,
            commit_state,
            ..
        } = err
        else {
            panic!("expected a ledger timeout, got {err}");
        };
        assert_eq!(commit_state, CommitState::Unknown);
        assert!(harness.ledger().ticket_ids().is_empty());

        let pending = harness.engine.pending_reconciliations().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].key, PendingKey::Submission(submission_id));

        // The submission lands after the caller gave up
        tokio::time::sleep(Duration::from_secs(2)).await;

        let status = harness
            .engine
            .reconcile_submission(submission_id)
            .await
            .unwrap();
        assert!(matches!(
            status,
            SubmissionStatus::Committed {
                ticket_id: Some(FIRST_TICKET_ID),
                ..
            }
        ));

        // Three attempts, one ticket
        assert_eq!(harness.ledger().ticket_ids(), vec![FIRST_TICKET_ID]);
        let snapshot = harness
            .engine
            .get_snapshot(FIRST_TICKET_ID)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.metadata.title, "Credential stuffing");
        assert_eq!(harness.sweeper.run_once().await.unwrap().examined, 0);
        harness.assert_converged().await;
    }

    /// Hold the next three ledger writes past the engine's wait.
    fn stall_ledger(harness: &Harness) {
        for _ in 0..3 {
            harness
                .faults()
                .inject(LedgerFault::Delay(Duration::from_secs(1)));
        }
    }

    /// Sweep while the stalled write is in flight, then after it lands.
    async fn recover_late_landing(
        harness: &Harness,
        ticket_id: TicketId,
        before: TicketStatus,
        after: TicketStatus,
    ) {
        let pending = harness.engine.pending_reconciliations().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].key, PendingKey::Ticket(ticket_id));

        let report = harness.sweeper.run_once().await.unwrap();
        assert_eq!(report.still_pending, 1);
        assert_eq!(report.repaired, 0);
        let snapshot = harness.engine.get_snapshot(ticket_id).await.unwrap().unwrap();
        assert_eq!(snapshot.status(), before);

        tokio::time::sleep(Duration::from_secs(2)).await;

        let report = harness.sweeper.run_once().await.unwrap();
        assert_eq!(report.repaired, 1);
        let snapshot = harness.engine.get_snapshot(ticket_id).await.unwrap().unwrap();
        assert_eq!(snapshot.status(), after);
        assert!(harness.engine.pending_reconciliations().await.unwrap().is_empty());
        harness.assert_converged().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_landing_transitions_recovered() {
        let harness = Harness::new();
        let a = analyst("a");
        let ticket_id = harness.open_ticket(500).await;

        stall_ledger(&harness);
        let err = harness.claim(a, ticket_id).await.unwrap_err();
        assert_eq!(err.commit_state(), Some(CommitState::Unknown));
        recover_late_landing(&harness, ticket_id, TicketStatus::Open, TicketStatus::Claimed).await;

        stall_ledger(&harness);
        let err = harness.submit(a, ticket_id).await.unwrap_err();
        assert_eq!(err.commit_state(), Some(CommitState::Unknown));
        recover_late_landing(
            &harness,
            ticket_id,
            TicketStatus::Claimed,
            TicketStatus::Submitted,
        )
        .await;

        stall_ledger(&harness);
        let err = harness
            .validate(certifier(), ticket_id, true)
            .await
            .unwrap_err();
        assert_eq!(err.commit_state(), Some(CommitState::Unknown));
        recover_late_landing(
            &harness,
            ticket_id,
            TicketStatus::Submitted,
            TicketStatus::Approved,
        )
        .await;

        assert_eq!(harness.index().balances(a).await.unwrap().rewards, 500);
        assert_eq!(
            harness.index().balances(client()).await.unwrap().stake_converted,
            500
        );
    }

    #[tokio::test]
    async fn test_lost_acknowledgement_commits_once() {
        let harness = Harness::new();
        harness.faults().inject(LedgerFault::CommitThenTimeout);

        let token = harness.stake(client(), 250).await;
        assert_eq!(harness.ledger().committed_count(), 1);
        assert_eq!(harness.ledger().stake_token(token).unwrap().amount, 250);

        let balances = harness.index().balances(client()).await.unwrap();
        assert_eq!(balances.stake_available, 250);
    }

    #[tokio::test]
    async fn test_malformed_ledger_record_surfaces() {
        let harness = Harness::new();
        let ticket_id = harness.open_ticket(500).await;
        assert!(harness.ledger().overwrite_status_code(ticket_id, 9));

        let result = harness.engine.reconcile(ticket_id).await;
        assert!(matches!(
            result,
            Err(LifecycleError::MalformedLedgerRecord { .. })
        ));
    }

    // =========================================================================
    // OUT-OF-ORDER WRITES
    // =========================================================================

    #[tokio::test]
    async fn test_out_of_order_write_discarded() {
        let harness = Harness::new();
        let ticket_id = harness.open_ticket(500).await;
        let open = harness.engine.get_snapshot(ticket_id).await.unwrap().unwrap();

        harness.claim(analyst("a"), ticket_id).await.unwrap();
        let claimed = harness.engine.get_snapshot(ticket_id).await.unwrap().unwrap();

        let outcome = harness.index().upsert_ticket(open).await.unwrap();
        assert_eq!(
            outcome,
            WriteOutcome::Stale {
                stored_version: claimed.version()
            }
        );
        let current = harness.engine.get_snapshot(ticket_id).await.unwrap().unwrap();
        assert_eq!(current, claimed);

        // A reconcile of the same version changes nothing either
        let reconciled = harness.engine.reconcile(ticket_id).await.unwrap();
        assert_eq!(reconciled.ticket, claimed.ticket);
        assert_eq!(reconciled.last_tx, claimed.last_tx);
    }

    #[tokio::test]
    async fn test_divergence_recorded_during_repair_survives() {
        let harness = Harness::new();
        let a = analyst("a");
        let ticket_id = harness.open_ticket(500).await;

        harness.index().fail_next_projections(100);
        harness.claim(a, ticket_id).await.unwrap();
        harness.index().fail_next_projections(0);

        // A report commits and fails to project while the claim is repaired
        let ctx = TxContext::new(a);
        let submitted = harness
            .ledger()
            .submit_report(ctx, ticket_id, Digest::of(b"incident report"))
            .await
            .unwrap();
        harness.index().record_before_next_projection(
            PendingReconciliation::new(PendingKey::Ticket(ticket_id), "projection failed")
                .with_last_tx(submitted.tx_id)
                .with_submission(ctx.submission_id),
        );

        let report = harness.sweeper.run_once().await.unwrap();
        assert_eq!(report.repaired, 1);
        let pending = harness.engine.pending_reconciliations().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].last_tx, Some(submitted.tx_id));

        let report = harness.sweeper.run_once().await.unwrap();
        assert_eq!(report.repaired, 1);
        assert!(harness.engine.pending_reconciliations().await.unwrap().is_empty());
        let snapshot = harness.engine.get_snapshot(ticket_id).await.unwrap().unwrap();
        assert_eq!(snapshot.status(), TicketStatus::Submitted);
        harness.assert_converged().await;
    }

    // =========================================================================
    // CIRCUIT BREAKER
    // =========================================================================

    #[tokio::test]
    async fn test_sweep_breaker_halts_and_resets() {
        let harness = Harness::new();
        let mut events = harness.bus.subscribe(EventFilter::all());
        let orphan = PendingKey::Ticket(9_999);
        harness
            .index()
            .record_reconciliation_pending(PendingReconciliation::new(orphan, "projection failed"))
            .await
            .unwrap();

        for failures in 1..=2 {
            let report = harness.sweeper.run_once().await.unwrap();
            assert!(report.is_total_failure());
            assert_eq!(harness.sweeper.state(), SweepState::Degraded { failures });
        }
        harness.sweeper.run_once().await.unwrap();
        assert_eq!(harness.sweeper.state(), SweepState::Halted);
        assert_eq!(harness.sweeper.run_once().await, Err(SweepError::Halted));

        let completed = events
            .drain()
            .into_iter()
            .filter(|e| matches!(e, DsocEvent::SweepCompleted { .. }))
            .count();
        assert_eq!(completed, 3);

        harness.engine.discard_pending(orphan).await.unwrap();
        assert_eq!(harness.sweeper.reset(), SweepState::Running);
        let report = harness.sweeper.run_once().await.unwrap();
        assert_eq!(report.examined, 0);
    }
}
