//! # Lifecycle Flow Tests
//!
//! End-to-end ticket flows through the engine: creation, claim, report,
//! validation and settlement, under both validator policies and both reward
//! distributions.
//!
//! ## Flow Tested
//!
//! ```text
//! stake → create (Open) → claim (Claimed) → submit (Submitted) → validate
//!                                                                 ├─ approve → Approved, rewards = stake
//!                                                                 └─ reject  → Rejected, refund  = stake
//! ```

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::*;

    use dsoc_01_ledger_client::RejectReason;
    use dsoc_02_index_store::IndexStore;
    use dsoc_03_ticket_lifecycle::{
        DistributionKind, EngineConfig, LifecycleError, TicketLifecycleApi,
    };
    use shared_bus::{DsocEvent, EventFilter};
    use shared_types::{RewardKind, Role, StakeSettlement, TicketStatus, ValidatorPolicy};

    // =========================================================================
    // REFERENCE SCENARIO
    // =========================================================================

    /// Ticket 1001 with stake 500: two analysts race, the winner submits, the
    /// certifier approves and the winner receives 500 in rewards.
    #[tokio::test]
    async fn test_reference_scenario() {
        let harness = Harness::new();
        let mut events = harness.bus.subscribe(EventFilter::all());
        let (a, b) = (analyst("a"), analyst("b"));

        let ticket_id = harness.open_ticket(500).await;
        assert_eq!(ticket_id, 1001);
        let snapshot = harness.engine.get_snapshot(1001).await.unwrap().unwrap();
        assert_eq!(snapshot.status(), TicketStatus::Open);
        assert_eq!(snapshot.ticket.analyst, None);

        let (claim_a, claim_b) = tokio::join!(harness.claim(a, 1001), harness.claim(b, 1001));
        let winner = match (&claim_a, &claim_b) {
            (Ok(_), Err(e)) | (Err(e), Ok(_)) => {
                assert!(matches!(
                    e,
                    LifecycleError::LedgerRejected {
                        reason: RejectReason::AlreadyClaimed { .. }
                    }
                ));
                if claim_a.is_ok() {
                    a
                } else {
                    b
                }
            }
            other => panic!("expected exactly one winner, got {other:?}"),
        };

        let claimed = harness.engine.get_snapshot(1001).await.unwrap().unwrap();
        assert_eq!(claimed.status(), TicketStatus::Claimed);
        assert_eq!(claimed.ticket.analyst, Some(winner));

        harness.submit(winner, 1001).await.unwrap();
        let applied = harness.validate(certifier(), 1001, true).await.unwrap();
        assert_eq!(applied.snapshot.unwrap().status(), TicketStatus::Approved);

        assert_eq!(applied.minted.len(), 1);
        let reward = &applied.minted[0];
        assert_eq!(reward.owner, winner);
        assert_eq!(reward.amount, 500);
        assert_eq!(reward.ticket_id, 1001);

        // The stake is no longer collectible by the client
        let client_balances = harness.index().balances(client()).await.unwrap();
        assert_eq!(client_balances.stake_available, 0);
        assert_eq!(client_balances.stake_locked, 0);
        assert_eq!(client_balances.stake_converted, 500);
        assert_eq!(
            harness.index().balances(winner).await.unwrap().rewards,
            500
        );

        let settled = events
            .drain()
            .into_iter()
            .find_map(|event| match event {
                DsocEvent::TicketValidated {
                    ticket_id,
                    approved,
                    minted,
                    ..
                } => Some((ticket_id, approved, minted)),
                _ => None,
            });
        assert_eq!(settled, Some((1001, true, 500)));
    }

    #[tokio::test]
    async fn test_rejection_refunds_client() {
        let harness = Harness::new();
        let ticket_id = harness.submitted_ticket(analyst("a"), 750).await;

        let applied = harness
            .validate(certifier(), ticket_id, false)
            .await
            .unwrap();
        assert_eq!(applied.snapshot.unwrap().status(), TicketStatus::Rejected);
        assert!(applied.minted.is_empty());
        assert_eq!(
            applied.stake_token.unwrap().settlement,
            Some(StakeSettlement::Refunded)
        );

        let balances = harness.index().balances(client()).await.unwrap();
        assert_eq!(balances.stake_refunded, 750);
        assert_eq!(balances.stake_converted, 0);
        assert!(harness.ledger().reward_tokens().is_empty());
    }

    // =========================================================================
    // STATE MACHINE
    // =========================================================================

    #[tokio::test]
    async fn test_no_transition_skipping() {
        let harness = Harness::new();
        let a = analyst("a");
        let ticket_id = harness.open_ticket(300).await;
        let sequence = harness.ledger().sequence();

        let submit = harness.submit(a, ticket_id).await;
        assert!(matches!(
            submit,
            Err(LifecycleError::InvalidTransition {
                from: TicketStatus::Open,
                ..
            })
        ));
        let validate = harness.validate(certifier(), ticket_id, true).await;
        assert!(matches!(
            validate,
            Err(LifecycleError::InvalidTransition { .. })
        ));
        assert_eq!(harness.ledger().sequence(), sequence);

        harness.claim(a, ticket_id).await.unwrap();
        harness.submit(a, ticket_id).await.unwrap();
        harness.validate(certifier(), ticket_id, true).await.unwrap();

        // Terminal: nothing moves it again
        let sequence = harness.ledger().sequence();
        for result in [
            harness.claim(analyst("b"), ticket_id).await,
            harness.submit(a, ticket_id).await,
            harness.validate(certifier(), ticket_id, false).await,
        ] {
            assert!(matches!(
                result,
                Err(LifecycleError::InvalidTransition {
                    from: TicketStatus::Approved,
                    ..
                })
            ));
        }
        assert_eq!(harness.ledger().sequence(), sequence);
    }

    #[tokio::test]
    async fn test_only_assigned_analyst_submits() {
        let harness = Harness::new();
        let ticket_id = harness.open_ticket(300).await;
        harness.claim(analyst("a"), ticket_id).await.unwrap();

        let result = harness.submit(analyst("b"), ticket_id).await;
        assert!(matches!(
            result,
            Err(LifecycleError::InvalidTransition { .. })
        ));
        let result = harness.claim(client(), ticket_id).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_terminal_tickets_stay_queryable() {
        let harness = Harness::new();
        let a = analyst("a");
        let approved = harness.submitted_ticket(a, 100).await;
        harness.validate(certifier(), approved, true).await.unwrap();
        let rejected = harness.submitted_ticket(a, 200).await;
        harness.validate(certifier(), rejected, false).await.unwrap();

        let mine = harness
            .index()
            .query_tickets_by_role(a, Role::Analyst)
            .await
            .unwrap();
        let ids: Vec<_> = mine.iter().map(|t| t.ticket_id()).collect();
        assert_eq!(ids, vec![rejected, approved]);

        let certified = harness
            .index()
            .query_tickets_by_role(certifier(), Role::Certifier)
            .await
            .unwrap();
        assert_eq!(certified.len(), 2);

        let user = harness.index().get_user(certifier()).await.unwrap().unwrap();
        assert_eq!(user.role, Role::Certifier);
    }

    // =========================================================================
    // VALIDATOR POLICY
    // =========================================================================

    #[tokio::test]
    async fn test_certifier_policy() {
        let harness = Harness::new();
        let ticket_id = harness.submitted_ticket(analyst("a"), 400).await;

        let by_client = harness.validate(client(), ticket_id, true).await;
        assert!(matches!(
            by_client,
            Err(LifecycleError::LedgerRejected {
                reason: RejectReason::NotValidator { .. }
            })
        ));
        let by_analyst = harness.validate(analyst("a"), ticket_id, true).await;
        assert!(matches!(
            by_analyst,
            Err(LifecycleError::InvalidTransition { .. })
        ));

        harness.validate(certifier(), ticket_id, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_client_policy() {
        let harness = Harness::with_config(EngineConfig {
            validator_policy: ValidatorPolicy::Client,
            ..EngineConfig::for_testing()
        });
        let ticket_id = harness.submitted_ticket(analyst("a"), 400).await;

        let by_certifier = harness.validate(certifier(), ticket_id, true).await;
        assert!(matches!(
            by_certifier,
            Err(LifecycleError::InvalidTransition { .. })
        ));

        let applied = harness.validate(client(), ticket_id, true).await.unwrap();
        let snapshot = applied.snapshot.unwrap();
        assert_eq!(snapshot.status(), TicketStatus::Approved);
        assert_eq!(snapshot.ticket.validated_by, Some(client()));
        assert_eq!(applied.minted[0].amount, 400);
    }

    // =========================================================================
    // REWARD DISTRIBUTION
    // =========================================================================

    #[tokio::test]
    async fn test_weighted_split_sums_to_stake() {
        let config = EngineConfig {
            distribution: DistributionKind::Weighted {
                analyst_bps: 8_000,
                certifier_bps: 1_000,
            },
            ..EngineConfig::for_testing()
        };
        let platform = config.platform_address;
        let harness = Harness::with_config(config);
        let a = analyst("a");

        let ticket_id = harness.submitted_ticket(a, 1001).await;
        let applied = harness
            .validate(certifier(), ticket_id, true)
            .await
            .unwrap();

        let total: u64 = applied.minted.iter().map(|r| r.amount).sum();
        assert_eq!(total, 1001);

        let share = |kind: RewardKind| {
            applied
                .minted
                .iter()
                .find(|r| r.kind == kind)
                .map(|r| (r.owner, r.amount))
        };
        assert_eq!(share(RewardKind::Analysis), Some((a, 801)));
        assert_eq!(share(RewardKind::Certification), Some((certifier(), 100)));
        assert_eq!(share(RewardKind::Platform), Some((platform, 100)));

        assert_eq!(harness.index().balances(a).await.unwrap().rewards, 801);
    }
}
