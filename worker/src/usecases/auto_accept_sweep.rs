use std::sync::Arc;

use anyhow::Result;
use application::error::OrderFlowError;
use application::usecases::order_lifecycle::{CompletionTrigger, OrderLifecycleUseCase};
use chrono::Utc;
use domain::repositories::orders::OrderRepository;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct AutoAcceptSweepParams {
    pub limit: i64,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AutoAcceptSweepResult {
    pub scanned: usize,
    pub completed: usize,
    pub dispute_blocked: usize,
    pub awaiting_provider: usize,
    pub conflicted: usize,
    pub failed: usize,
    pub candidate_ids: Vec<Uuid>,
    pub completed_ids: Vec<Uuid>,
    pub failed_ids: Vec<Uuid>,
}

/// Completes delivered orders whose review window has lapsed without the
/// buyer acting. Each order goes through the same completion path a buyer
/// accept takes, so capture, settlement and payout behave identically.
pub struct AutoAcceptSweepUseCase {
    orders: Arc<dyn OrderRepository + Send + Sync>,
    lifecycle: Arc<OrderLifecycleUseCase>,
}

impl AutoAcceptSweepUseCase {
    pub fn new(
        orders: Arc<dyn OrderRepository + Send + Sync>,
        lifecycle: Arc<OrderLifecycleUseCase>,
    ) -> Self {
        Self { orders, lifecycle }
    }

    pub async fn run(&self, params: AutoAcceptSweepParams) -> Result<AutoAcceptSweepResult> {
        let limit = params.limit.max(1);
        let due_orders = self
            .orders
            .list_due_for_auto_accept(Utc::now(), limit)
            .await?;

        let mut result = AutoAcceptSweepResult {
            scanned: due_orders.len(),
            ..Default::default()
        };

        for order in due_orders {
            if result.candidate_ids.len() < 20 {
                result.candidate_ids.push(order.id);
            }

            if params.dry_run {
                continue;
            }

            match self
                .lifecycle
                .complete(order.id, CompletionTrigger::AutoAccept)
                .await
            {
                Ok(()) => {
                    result.completed += 1;
                    if result.completed_ids.len() < 20 {
                        result.completed_ids.push(order.id);
                    }
                }
                Err(OrderFlowError::DisputePending) => {
                    // the listing excludes disputed orders, but a dispute can
                    // open between the listing and the claim
                    info!(
                        order_id = %order.id,
                        "auto_accept_sweep: dispute opened mid-sweep; order stays frozen"
                    );
                    result.dispute_blocked += 1;
                }
                Err(OrderFlowError::ReconciliationPending) => {
                    info!(
                        order_id = %order.id,
                        "auto_accept_sweep: capture awaiting provider confirmation; \
                         the webhook resumes this order"
                    );
                    result.awaiting_provider += 1;
                }
                Err(
                    OrderFlowError::ConcurrentModification
                    | OrderFlowError::InvalidTransition { .. },
                ) => {
                    warn!(
                        order_id = %order.id,
                        "auto_accept_sweep: order moved under the sweep; next run re-evaluates"
                    );
                    result.conflicted += 1;
                }
                Err(err) => {
                    error!(
                        order_id = %order.id,
                        error = ?err,
                        "auto_accept_sweep: completion failed"
                    );
                    result.failed += 1;
                    if result.failed_ids.len() < 20 {
                        result.failed_ids.push(order.id);
                    }
                }
            }
        }

        info!(
            scanned = result.scanned,
            completed = result.completed,
            dispute_blocked = result.dispute_blocked,
            awaiting_provider = result.awaiting_provider,
            conflicted = result.conflicted,
            failed = result.failed,
            dry_run = params.dry_run,
            "auto_accept_sweep: completed"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use domain::entities::escrow_holds::EscrowHoldEntity;
    use domain::entities::orders::OrderEntity;
    use domain::entities::settlements::SettlementEntity;
    use domain::repositories::disputes::MockDisputeRepository;
    use domain::repositories::escrow_gateway::MockEscrowGateway;
    use domain::repositories::escrow_holds::MockEscrowHoldRepository;
    use domain::repositories::events::MockDomainEventPublisher;
    use domain::repositories::orders::MockOrderRepository;
    use domain::repositories::payout_profiles::MockPayoutProfileRepository;
    use domain::repositories::settlements::MockSettlementRepository;
    use domain::value_objects::enums::escrow_states::EscrowState;
    use domain::value_objects::enums::order_statuses::OrderStatus;
    use domain::value_objects::gateway::ProviderCallOutcome;
    use domain::value_objects::orders::{ClaimOutcome, TransitionOutcome};
    use domain::value_objects::policy::{FeePolicy, LifecyclePolicy};
    use mockall::predicate::eq;

    struct Fixture {
        sweep_orders: MockOrderRepository,
        lifecycle_orders: MockOrderRepository,
        holds: MockEscrowHoldRepository,
        settlements: MockSettlementRepository,
        disputes: MockDisputeRepository,
        profiles: MockPayoutProfileRepository,
        gateway: MockEscrowGateway,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                sweep_orders: MockOrderRepository::new(),
                lifecycle_orders: MockOrderRepository::new(),
                holds: MockEscrowHoldRepository::new(),
                settlements: MockSettlementRepository::new(),
                disputes: MockDisputeRepository::new(),
                profiles: MockPayoutProfileRepository::new(),
                gateway: MockEscrowGateway::new(),
            }
        }

        fn build(self) -> AutoAcceptSweepUseCase {
            let mut events = MockDomainEventPublisher::new();
            events
                .expect_publish()
                .returning(|_| Box::pin(async { Ok(()) }));

            let lifecycle = Arc::new(OrderLifecycleUseCase::new(
                Arc::new(self.lifecycle_orders),
                Arc::new(self.holds),
                Arc::new(self.settlements),
                Arc::new(self.disputes),
                Arc::new(self.profiles),
                Arc::new(self.gateway),
                Arc::new(events),
                FeePolicy {
                    version: "2025-01".to_string(),
                    fee_bps: 1_500,
                },
                LifecyclePolicy {
                    review_days: 3,
                    dispute_window_days: 14,
                    dispute_escalate_days: 3,
                },
            ));

            AutoAcceptSweepUseCase::new(Arc::new(self.sweep_orders), lifecycle)
        }
    }

    fn overdue_order() -> OrderEntity {
        let now = Utc::now();
        OrderEntity {
            id: Uuid::new_v4(),
            buyer_id: Uuid::new_v4(),
            seller_id: Uuid::new_v4(),
            gig_id: Uuid::new_v4(),
            package_id: None,
            currency: "USD".to_string(),
            total_amount_minor: 4_900,
            status: OrderStatus::Delivered.to_string(),
            delivery_days: 5,
            delivery_deadline: now - Duration::days(4),
            delivered_at: Some(now - Duration::days(4)),
            review_deadline: Some(now - Duration::hours(1)),
            disputable_until: Some(now + Duration::days(10)),
            revision_count: 0,
            max_revisions: 2,
            provider_payment_ref: Some("hold_abc".to_string()),
            cancelled_by: None,
            cancel_reason: None,
            version: 0,
            created_at: now - Duration::days(9),
            updated_at: now - Duration::days(4),
        }
    }

    fn captured_hold(order_id: Uuid) -> EscrowHoldEntity {
        let now = Utc::now();
        EscrowHoldEntity {
            id: Uuid::new_v4(),
            order_id,
            provider_ref: "hold_abc".to_string(),
            amount_minor: 4_900,
            captured_minor: 4_900,
            refunded_minor: 0,
            state: EscrowState::Captured.to_string(),
            attempt_generation: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn authorized_hold(order_id: Uuid) -> EscrowHoldEntity {
        EscrowHoldEntity {
            captured_minor: 0,
            state: EscrowState::Authorized.to_string(),
            ..captured_hold(order_id)
        }
    }

    fn initiated_settlement(order_id: Uuid) -> SettlementEntity {
        let now = Utc::now();
        SettlementEntity {
            id: Uuid::new_v4(),
            order_id,
            gross_minor: 4_900,
            fee_minor: 735,
            seller_earnings_minor: 4_165,
            fee_bps: 1_500,
            fee_policy_version: "2025-01".to_string(),
            payout_status: "pending".to_string(),
            payout_ref: Some("tr_001".to_string()),
            payout_error: None,
            computed_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn an_overdue_delivery_is_completed() {
        let mut fixture = Fixture::new();
        let order = overdue_order();
        let order_id = order.id;

        fixture
            .sweep_orders
            .expect_list_due_for_auto_accept()
            .withf(|_, limit| *limit == 50)
            .returning(move |_, _| {
                let order = order.clone();
                Box::pin(async move { Ok(vec![order]) })
            });

        let lifecycle_copy = {
            let mut order = overdue_order();
            order.id = order_id;
            order
        };
        fixture
            .lifecycle_orders
            .expect_find_by_id()
            .with(eq(order_id))
            .returning(move |_| {
                let order = lifecycle_copy.clone();
                Box::pin(async move { Ok(Some(order)) })
            });
        fixture
            .disputes
            .expect_has_unresolved_for_order()
            .with(eq(order_id))
            .returning(|_| Box::pin(async { Ok(false) }));
        fixture
            .lifecycle_orders
            .expect_claim_transition()
            .with(eq(order_id), eq(0i64), eq("delivered".to_string()))
            .returning(|_, _, _| Box::pin(async { Ok(ClaimOutcome::Claimed { version: 1 }) }));
        fixture
            .settlements
            .expect_upsert_for_order()
            .withf(|settlement| {
                settlement.fee_minor == 735 && settlement.seller_earnings_minor == 4_165
            })
            .returning(|_| Box::pin(async { Ok(Uuid::new_v4()) }));
        fixture.holds.expect_find_by_order().returning(move |id| {
            let hold = captured_hold(id);
            Box::pin(async move { Ok(Some(hold)) })
        });
        fixture
            .settlements
            .expect_find_by_order()
            .returning(|id| {
                let settlement = initiated_settlement(id);
                Box::pin(async move { Ok(Some(settlement)) })
            });
        fixture
            .lifecycle_orders
            .expect_transition_status()
            .withf(|write| {
                write.from == OrderStatus::Delivered && write.to == OrderStatus::Completed
            })
            .returning(|_| Box::pin(async { Ok(TransitionOutcome::Applied) }));

        let usecase = fixture.build();
        let result = usecase
            .run(AutoAcceptSweepParams {
                limit: 50,
                dry_run: false,
            })
            .await
            .unwrap();

        assert_eq!(result.scanned, 1);
        assert_eq!(result.completed, 1);
        assert_eq!(result.completed_ids, vec![order_id]);
        assert_eq!(result.failed, 0);
    }

    #[tokio::test]
    async fn a_dispute_opened_mid_sweep_leaves_the_order_frozen() {
        let mut fixture = Fixture::new();
        let order = overdue_order();
        let order_id = order.id;

        fixture
            .sweep_orders
            .expect_list_due_for_auto_accept()
            .returning(move |_, _| {
                let order = order.clone();
                Box::pin(async move { Ok(vec![order]) })
            });

        let lifecycle_copy = {
            let mut order = overdue_order();
            order.id = order_id;
            order
        };
        fixture
            .lifecycle_orders
            .expect_find_by_id()
            .with(eq(order_id))
            .returning(move |_| {
                let order = lifecycle_copy.clone();
                Box::pin(async move { Ok(Some(order)) })
            });
        fixture
            .disputes
            .expect_has_unresolved_for_order()
            .with(eq(order_id))
            .returning(|_| Box::pin(async { Ok(true) }));

        let usecase = fixture.build();
        let result = usecase
            .run(AutoAcceptSweepParams {
                limit: 50,
                dry_run: false,
            })
            .await
            .unwrap();

        assert_eq!(result.dispute_blocked, 1);
        assert_eq!(result.completed, 0);
        assert_eq!(result.failed, 0);
    }

    #[tokio::test]
    async fn a_lost_claim_is_left_for_the_next_run() {
        let mut fixture = Fixture::new();
        let order = overdue_order();
        let order_id = order.id;

        fixture
            .sweep_orders
            .expect_list_due_for_auto_accept()
            .returning(move |_, _| {
                let order = order.clone();
                Box::pin(async move { Ok(vec![order]) })
            });

        let lifecycle_copy = {
            let mut order = overdue_order();
            order.id = order_id;
            order
        };
        fixture
            .lifecycle_orders
            .expect_find_by_id()
            .with(eq(order_id))
            .returning(move |_| {
                let order = lifecycle_copy.clone();
                Box::pin(async move { Ok(Some(order)) })
            });
        fixture
            .disputes
            .expect_has_unresolved_for_order()
            .returning(|_| Box::pin(async { Ok(false) }));
        fixture
            .lifecycle_orders
            .expect_claim_transition()
            .returning(|_, _, _| Box::pin(async { Ok(ClaimOutcome::Conflict) }));

        let usecase = fixture.build();
        let result = usecase
            .run(AutoAcceptSweepParams {
                limit: 50,
                dry_run: false,
            })
            .await
            .unwrap();

        assert_eq!(result.conflicted, 1);
        assert_eq!(result.completed, 0);
    }

    #[tokio::test]
    async fn an_order_the_buyer_accepted_mid_sweep_counts_as_completed() {
        let mut fixture = Fixture::new();
        let order = overdue_order();
        let order_id = order.id;

        fixture
            .sweep_orders
            .expect_list_due_for_auto_accept()
            .returning(move |_, _| {
                let order = order.clone();
                Box::pin(async move { Ok(vec![order]) })
            });

        // The fresh load sees the buyer's accept that landed after the
        // listing; completion short-circuits without touching the gateway.
        let settled_copy = {
            let mut order = overdue_order();
            order.id = order_id;
            order.status = OrderStatus::Completed.to_string();
            order.version = 1;
            order
        };
        fixture
            .lifecycle_orders
            .expect_find_by_id()
            .with(eq(order_id))
            .returning(move |_| {
                let order = settled_copy.clone();
                Box::pin(async move { Ok(Some(order)) })
            });

        let usecase = fixture.build();
        let result = usecase
            .run(AutoAcceptSweepParams {
                limit: 50,
                dry_run: false,
            })
            .await
            .unwrap();

        assert_eq!(result.completed, 1);
        assert_eq!(result.conflicted, 0);
        assert_eq!(result.failed, 0);
    }

    #[tokio::test]
    async fn an_unknown_capture_outcome_defers_to_the_webhook() {
        let mut fixture = Fixture::new();
        let order = overdue_order();
        let order_id = order.id;

        fixture
            .sweep_orders
            .expect_list_due_for_auto_accept()
            .returning(move |_, _| {
                let order = order.clone();
                Box::pin(async move { Ok(vec![order]) })
            });

        let lifecycle_copy = {
            let mut order = overdue_order();
            order.id = order_id;
            order
        };
        fixture
            .lifecycle_orders
            .expect_find_by_id()
            .with(eq(order_id))
            .returning(move |_| {
                let order = lifecycle_copy.clone();
                Box::pin(async move { Ok(Some(order)) })
            });
        fixture
            .disputes
            .expect_has_unresolved_for_order()
            .returning(|_| Box::pin(async { Ok(false) }));
        fixture
            .lifecycle_orders
            .expect_claim_transition()
            .returning(|_, _, _| Box::pin(async { Ok(ClaimOutcome::Claimed { version: 1 }) }));
        fixture
            .settlements
            .expect_upsert_for_order()
            .returning(|_| Box::pin(async { Ok(Uuid::new_v4()) }));
        fixture.holds.expect_find_by_order().returning(move |id| {
            let hold = authorized_hold(id);
            Box::pin(async move { Ok(Some(hold)) })
        });
        fixture
            .gateway
            .expect_capture()
            .withf(|provider_ref, amount, _| provider_ref == "hold_abc" && *amount == 4_900)
            .returning(|_, _, _| {
                Box::pin(async {
                    Ok(ProviderCallOutcome::Unknown(
                        "provider timed out".to_string(),
                    ))
                })
            });

        let usecase = fixture.build();
        let result = usecase
            .run(AutoAcceptSweepParams {
                limit: 50,
                dry_run: false,
            })
            .await
            .unwrap();

        assert_eq!(result.awaiting_provider, 1);
        assert_eq!(result.completed, 0);
        assert_eq!(result.failed, 0);
    }

    #[tokio::test]
    async fn dry_run_lists_candidates_without_completing() {
        let mut fixture = Fixture::new();
        let first = overdue_order();
        let second = overdue_order();
        let expected_ids = vec![first.id, second.id];

        fixture
            .sweep_orders
            .expect_list_due_for_auto_accept()
            .returning(move |_, _| {
                let orders = vec![first.clone(), second.clone()];
                Box::pin(async move { Ok(orders) })
            });

        let usecase = fixture.build();
        let result = usecase
            .run(AutoAcceptSweepParams {
                limit: 50,
                dry_run: true,
            })
            .await
            .unwrap();

        assert_eq!(result.scanned, 2);
        assert_eq!(result.candidate_ids, expected_ids);
        assert_eq!(result.completed, 0);
    }
}
