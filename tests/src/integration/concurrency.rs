//! # Concurrency Tests
//!
//! Concurrent intents against one ledger: claim races on a single ticket,
//! double spends of one stake token, and many tickets progressing in
//! parallel on a multi-threaded runtime.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::future::join_all;

    use crate::integration::fixtures::*;

    use dsoc_01_ledger_client::{LedgerClient, RejectReason};
    use dsoc_03_ticket_lifecycle::{Intent, LifecycleError, TicketLifecycleApi};
    use dsoc_04_reconciliation::SweepApi;
    use shared_types::{Amount, Digest, StakeSettlement, TicketId, TicketStatus};

    // =========================================================================
    // CLAIM RACE
    // =========================================================================

    #[tokio::test]
    async fn test_claim_race_single_winner() {
        let harness = Harness::new();
        let ticket_id = harness.open_ticket(500).await;
        let analysts: Vec<_> = (0..8).map(|i| analyst(&i.to_string())).collect();

        let results = join_all(
            analysts
                .iter()
                .map(|who| harness.claim(*who, ticket_id)),
        )
        .await;

        let winners: Vec<_> = analysts
            .iter()
            .zip(&results)
            .filter(|(_, result)| result.is_ok())
            .map(|(analyst, _)| *analyst)
            .collect();
        assert_eq!(winners.len(), 1);

        let losers = results.iter().filter_map(|r| r.as_ref().err());
        for error in losers {
            assert!(
                matches!(
                    error,
                    LifecycleError::LedgerRejected {
                        reason: RejectReason::AlreadyClaimed { .. }
                    }
                ),
                "unexpected loser outcome: {error}"
            );
        }

        let on_ledger = harness.ledger().get_ticket(ticket_id).await.unwrap().unwrap();
        assert_eq!(on_ledger.status, TicketStatus::Claimed);
        assert_eq!(on_ledger.analyst, Some(winners[0]));
        harness.assert_converged().await;
    }

    #[tokio::test]
    async fn test_lost_claim_on_stale_index() {
        let harness = Harness::new();
        let ticket_id = harness.open_ticket(500).await;

        harness.index().fail_next_projections(100);
        let first = harness.claim(analyst("a"), ticket_id).await.unwrap();
        assert!(!first.is_fresh());
        harness.index().fail_next_projections(0);

        // The index still shows Open, so only the ledger can refuse
        let snapshot = harness.engine.get_snapshot(ticket_id).await.unwrap().unwrap();
        assert_eq!(snapshot.status(), TicketStatus::Open);
        let sequence = harness.ledger().sequence();

        let result = harness.claim(analyst("b"), ticket_id).await;
        assert!(matches!(
            result,
            Err(LifecycleError::LedgerRejected {
                reason: RejectReason::AlreadyClaimed { .. }
            })
        ));
        assert_eq!(harness.ledger().sequence(), sequence);

        harness.sweeper.run_once().await.unwrap();
        harness.assert_converged().await;
    }

    // =========================================================================
    // DOUBLE SPEND
    // =========================================================================

    #[tokio::test]
    async fn test_concurrent_double_spend() {
        let harness = Harness::new();
        let token = harness.stake(client(), 500).await;

        let (first, second) =
            tokio::join!(harness.create(client(), token), harness.create(client(), token));
        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes.iter().any(|r| matches!(
            r,
            Err(LifecycleError::LedgerRejected {
                reason: RejectReason::DoubleSpend { .. }
            })
        )));

        assert_eq!(harness.ledger().ticket_ids(), vec![FIRST_TICKET_ID]);
        let stake = harness.ledger().stake_token(token).unwrap();
        assert!(stake.is_used);
        assert_eq!(stake.locked_for, Some(FIRST_TICKET_ID));
    }

    #[tokio::test]
    async fn test_foreign_stake_rejected() {
        let harness = Harness::new();
        let token = harness.stake(client(), 500).await;
        let thief = analyst("thief");

        let result = harness.create(thief, token).await;
        assert!(matches!(
            result,
            Err(LifecycleError::LedgerRejected {
                reason: RejectReason::NotStakeOwner { .. }
            })
        ));
        assert!(!harness.ledger().stake_token(token).unwrap().is_used);
    }

    // =========================================================================
    // PARALLEL TICKETS
    // =========================================================================

    async fn run_ticket(engine: Arc<Engine>, n: u64) -> (TicketId, Amount, bool) {
        let amount = 100 + n * 37;
        let approved = n % 3 != 0;
        let worker = analyst(&format!("worker-{n}"));

        let token = engine
            .apply(Intent::Stake {
                owner: client(),
                amount,
            })
            .await
            .unwrap()
            .stake_token
            .unwrap()
            .token_id;
        let ticket_id = engine
            .apply(Intent::CreateTicket {
                client: client(),
                stake_token: token,
                evidence_hash: Digest::of(format!("evidence-{n}").as_bytes()),
                metadata: metadata(&format!("Incident {n}")),
            })
            .await
            .unwrap()
            .ticket_id()
            .unwrap();
        engine
            .apply(Intent::Claim {
                analyst: worker,
                ticket_id,
            })
            .await
            .unwrap();
        engine
            .apply(Intent::SubmitReport {
                analyst: worker,
                ticket_id,
                report_hash: Digest::of(format!("report-{n}").as_bytes()),
            })
            .await
            .unwrap();
        engine
            .apply(Intent::Validate {
                validator: certifier(),
                ticket_id,
                approved,
            })
            .await
            .unwrap();
        (ticket_id, amount, approved)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_tickets_conserve_stake() {
        let harness = Harness::new();

        let handles: Vec<_> = (0..16)
            .map(|n| tokio::spawn(run_ticket(Arc::clone(&harness.engine), n)))
            .collect();
        let mut settled = Vec::new();
        for handle in handles {
            settled.push(handle.await.unwrap());
        }

        let mut ids: Vec<_> = settled.iter().map(|(id, _, _)| *id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 16);

        let rewards = harness.ledger().reward_tokens();
        for (ticket_id, amount, approved) in &settled {
            let minted: Amount = rewards
                .iter()
                .filter(|r| r.ticket_id == *ticket_id)
                .map(|r| r.amount)
                .sum();
            let ticket = harness
                .ledger()
                .get_ticket(*ticket_id)
                .await
                .unwrap()
                .unwrap();
            let stake = harness.ledger().stake_token(ticket.stake_token).unwrap();
            assert_eq!(ticket.stake_amount, *amount);

            if *approved {
                assert_eq!(ticket.status, TicketStatus::Approved);
                assert_eq!(minted, *amount);
                assert_eq!(stake.settlement, Some(StakeSettlement::Converted));
            } else {
                assert_eq!(ticket.status, TicketStatus::Rejected);
                assert_eq!(minted, 0);
                assert_eq!(stake.settlement, Some(StakeSettlement::Refunded));
            }
        }
        harness.assert_converged().await;
    }
}
