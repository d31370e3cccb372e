use std::sync::Arc;

use tracing::{error, info, warn};

use domain::entities::webhook_events::InsertWebhookEventEntity;
use domain::repositories::escrow_gateway::EscrowGateway;
use domain::repositories::webhook_events::{ReceivedEventDisposition, WebhookEventRepository};
use domain::value_objects::provider_events::{ProviderEvent, ProviderEventKind};

use crate::error::{FlowResult, OrderFlowError};
use crate::usecases::order_lifecycle::OrderLifecycleUseCase;

const APPLY_ATTEMPTS: usize = 3;

/// What the HTTP layer should tell the provider about a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookAck {
    Processed,
    Duplicate,
    Ignored,
}

/// Turns provider webhook deliveries into exactly-once lifecycle effects.
///
/// The dedupe ledger is written before any effect and stamped processed only
/// after all effects landed, so a crash in between lets the provider's
/// redelivery resume the same event instead of double-applying it.
pub struct WebhookReconcilerUseCase {
    gateway: Arc<dyn EscrowGateway + Send + Sync>,
    webhook_events: Arc<dyn WebhookEventRepository + Send + Sync>,
    lifecycle: Arc<OrderLifecycleUseCase>,
}

impl WebhookReconcilerUseCase {
    pub fn new(
        gateway: Arc<dyn EscrowGateway + Send + Sync>,
        webhook_events: Arc<dyn WebhookEventRepository + Send + Sync>,
        lifecycle: Arc<OrderLifecycleUseCase>,
    ) -> Self {
        Self {
            gateway,
            webhook_events,
            lifecycle,
        }
    }

    pub async fn handle_delivery(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> FlowResult<WebhookAck> {
        let event = match self
            .gateway
            .verify_webhook_signature(payload, signature_header)
        {
            Ok(event) => event,
            Err(err) => {
                warn!(error = ?err, "webhook: rejected delivery with a bad signature");
                return Err(OrderFlowError::InvalidSignature);
            }
        };

        match self
            .webhook_events
            .record_received(InsertWebhookEventEntity {
                provider_event_id: event.provider_event_id.clone(),
                event_type: event.event_type.clone(),
                payload_hash: event.payload_hash.clone(),
            })
            .await?
        {
            ReceivedEventDisposition::AlreadyProcessed => {
                info!(
                    provider_event_id = %event.provider_event_id,
                    "webhook: duplicate delivery acknowledged without effects"
                );
                return Ok(WebhookAck::Duplicate);
            }
            ReceivedEventDisposition::New | ReceivedEventDisposition::Resumed => {}
        }

        if let ProviderEventKind::Unrecognized { event_type } = &event.kind {
            warn!(
                provider_event_id = %event.provider_event_id,
                event_type = %event_type,
                "webhook: unrecognized event type acknowledged"
            );
            self.webhook_events
                .mark_processed(event.provider_event_id.clone())
                .await?;
            return Ok(WebhookAck::Ignored);
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.apply(&event).await {
                Ok(()) => break,
                Err(OrderFlowError::ConcurrentModification) if attempt < APPLY_ATTEMPTS => {
                    warn!(
                        provider_event_id = %event.provider_event_id,
                        attempt,
                        "webhook: lost a concurrent transition, retrying"
                    );
                }
                Err(err) if Self::acknowledgeable(&err) => {
                    // redelivering the same payload cannot change this
                    // outcome; acknowledge it and leave the trail in the logs
                    error!(
                        provider_event_id = %event.provider_event_id,
                        event_type = %event.event_type,
                        error = %err,
                        "webhook: event could not be applied against local state"
                    );
                    break;
                }
                Err(err) => return Err(err),
            }
        }

        self.webhook_events
            .mark_processed(event.provider_event_id.clone())
            .await?;
        info!(
            provider_event_id = %event.provider_event_id,
            event_type = %event.event_type,
            "webhook: event processed"
        );
        Ok(WebhookAck::Processed)
    }

    async fn apply(&self, event: &ProviderEvent) -> FlowResult<()> {
        match &event.kind {
            ProviderEventKind::PaymentAuthorized {
                order_id,
                provider_ref,
                amount_minor,
            } => {
                self.lifecycle
                    .mark_payment_authorized(*order_id, provider_ref, *amount_minor)
                    .await
            }
            ProviderEventKind::PaymentFailed {
                order_id, reason, ..
            } => self.lifecycle.mark_payment_failed(*order_id, reason).await,
            ProviderEventKind::PaymentCaptured {
                order_id,
                captured_minor,
                ..
            } => {
                self.lifecycle
                    .reconcile_captured(*order_id, *captured_minor)
                    .await
            }
            ProviderEventKind::PaymentRefunded {
                order_id,
                refunded_total_minor,
                ..
            } => {
                self.lifecycle
                    .reconcile_refunded(*order_id, *refunded_total_minor)
                    .await
            }
            ProviderEventKind::PayoutCompleted {
                order_id,
                transfer_ref,
            } => {
                self.lifecycle
                    .reconcile_payout_completed(*order_id, transfer_ref.clone())
                    .await
            }
            ProviderEventKind::PayoutFailed {
                order_id, reason, ..
            } => {
                self.lifecycle
                    .reconcile_payout_failed(*order_id, reason.clone())
                    .await
            }
            ProviderEventKind::Unrecognized { .. } => Ok(()),
        }
    }

    /// Errors that describe a standing disagreement between the event and
    /// local state. Redelivery would hit the same wall, so these are
    /// acknowledged; a later event (or an operator) resolves the state.
    fn acknowledgeable(err: &OrderFlowError) -> bool {
        matches!(
            err,
            OrderFlowError::ReconciliationPending
                | OrderFlowError::InvalidTransition { .. }
                | OrderFlowError::DisputePending
                | OrderFlowError::Validation(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use domain::entities::orders::OrderEntity;
    use domain::repositories::disputes::MockDisputeRepository;
    use domain::repositories::escrow_gateway::MockEscrowGateway;
    use domain::repositories::escrow_holds::MockEscrowHoldRepository;
    use domain::repositories::events::MockDomainEventPublisher;
    use domain::repositories::orders::MockOrderRepository;
    use domain::repositories::payout_profiles::MockPayoutProfileRepository;
    use domain::repositories::settlements::MockSettlementRepository;
    use domain::repositories::webhook_events::MockWebhookEventRepository;
    use domain::value_objects::enums::order_statuses::OrderStatus;
    use domain::value_objects::orders::TransitionOutcome;
    use domain::value_objects::policy::{FeePolicy, LifecyclePolicy};
    use mockall::predicate::eq;

    struct Fixture {
        gateway: MockEscrowGateway,
        webhook_events: MockWebhookEventRepository,
        orders: MockOrderRepository,
        holds: MockEscrowHoldRepository,
        settlements: MockSettlementRepository,
        disputes: MockDisputeRepository,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                gateway: MockEscrowGateway::new(),
                webhook_events: MockWebhookEventRepository::new(),
                orders: MockOrderRepository::new(),
                holds: MockEscrowHoldRepository::new(),
                settlements: MockSettlementRepository::new(),
                disputes: MockDisputeRepository::new(),
            }
        }

        fn build(self) -> WebhookReconcilerUseCase {
            let mut events = MockDomainEventPublisher::new();
            events
                .expect_publish()
                .returning(|_| Box::pin(async { Ok(()) }));
            let lifecycle = Arc::new(OrderLifecycleUseCase::new(
                Arc::new(self.orders),
                Arc::new(self.holds),
                Arc::new(self.settlements),
                Arc::new(self.disputes),
                Arc::new(MockPayoutProfileRepository::new()),
                Arc::new(MockEscrowGateway::new()),
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
            WebhookReconcilerUseCase::new(
                Arc::new(self.gateway),
                Arc::new(self.webhook_events),
                lifecycle,
            )
        }
    }

    fn sample_order(status: OrderStatus) -> OrderEntity {
        let now = Utc::now();
        OrderEntity {
            id: Uuid::new_v4(),
            buyer_id: Uuid::new_v4(),
            seller_id: Uuid::new_v4(),
            gig_id: Uuid::new_v4(),
            package_id: None,
            currency: "USD".to_string(),
            total_amount_minor: 4_900,
            status: status.to_string(),
            delivery_days: 5,
            delivery_deadline: now + Duration::days(5),
            delivered_at: None,
            review_deadline: None,
            disputable_until: None,
            revision_count: 0,
            max_revisions: 2,
            provider_payment_ref: Some("hold_abc".to_string()),
            cancelled_by: None,
            cancel_reason: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn provider_event(event_type: &str, kind: ProviderEventKind) -> ProviderEvent {
        ProviderEvent {
            provider_event_id: "evt_001".to_string(),
            event_type: event_type.to_string(),
            payload_hash: "feed".to_string(),
            kind,
        }
    }

    #[tokio::test]
    async fn a_capture_event_is_applied_and_marked_processed() {
        let mut fixture = Fixture::new();
        let order = sample_order(OrderStatus::Completed);
        let order_id = order.id;

        let event = provider_event(
            "payment.captured",
            ProviderEventKind::PaymentCaptured {
                order_id,
                provider_ref: "hold_abc".to_string(),
                captured_minor: 4_900,
            },
        );
        fixture
            .gateway
            .expect_verify_webhook_signature()
            .returning(move |_, _| Ok(event.clone()));
        fixture
            .webhook_events
            .expect_record_received()
            .withf(|insert| insert.provider_event_id == "evt_001")
            .returning(|_| Box::pin(async { Ok(ReceivedEventDisposition::New) }));
        fixture
            .holds
            .expect_mark_captured()
            .with(eq(order_id), eq(4_900i64))
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(()) }));
        fixture.orders.expect_find_by_id().returning(move |_| {
            let order = order.clone();
            Box::pin(async move { Ok(Some(order)) })
        });
        fixture
            .webhook_events
            .expect_mark_processed()
            .with(eq("evt_001".to_string()))
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));

        let usecase = fixture.build();
        let ack = usecase
            .handle_delivery(b"{}", "t=1,v1=aa")
            .await
            .unwrap();
        assert_eq!(ack, WebhookAck::Processed);
    }

    #[tokio::test]
    async fn a_duplicate_delivery_is_acknowledged_without_effects() {
        let mut fixture = Fixture::new();
        let event = provider_event(
            "payment.captured",
            ProviderEventKind::PaymentCaptured {
                order_id: Uuid::new_v4(),
                provider_ref: "hold_abc".to_string(),
                captured_minor: 4_900,
            },
        );
        fixture
            .gateway
            .expect_verify_webhook_signature()
            .returning(move |_, _| Ok(event.clone()));
        fixture
            .webhook_events
            .expect_record_received()
            .returning(|_| Box::pin(async { Ok(ReceivedEventDisposition::AlreadyProcessed) }));

        let usecase = fixture.build();
        let ack = usecase
            .handle_delivery(b"{}", "t=1,v1=aa")
            .await
            .unwrap();
        assert_eq!(ack, WebhookAck::Duplicate);
    }

    #[tokio::test]
    async fn a_bad_signature_is_rejected_before_any_recording() {
        let mut fixture = Fixture::new();
        fixture
            .gateway
            .expect_verify_webhook_signature()
            .returning(|_, _| Err(anyhow::anyhow!("signature mismatch")));

        let usecase = fixture.build();
        let err = usecase
            .handle_delivery(b"{}", "t=1,v1=bad")
            .await
            .unwrap_err();
        assert!(matches!(err, OrderFlowError::InvalidSignature));
    }

    #[tokio::test]
    async fn an_unrecognized_event_type_is_recorded_and_ignored() {
        let mut fixture = Fixture::new();
        let event = provider_event(
            "payment.disputed",
            ProviderEventKind::Unrecognized {
                event_type: "payment.disputed".to_string(),
            },
        );
        fixture
            .gateway
            .expect_verify_webhook_signature()
            .returning(move |_, _| Ok(event.clone()));
        fixture
            .webhook_events
            .expect_record_received()
            .returning(|_| Box::pin(async { Ok(ReceivedEventDisposition::New) }));
        fixture
            .webhook_events
            .expect_mark_processed()
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));

        let usecase = fixture.build();
        let ack = usecase
            .handle_delivery(b"{}", "t=1,v1=aa")
            .await
            .unwrap();
        assert_eq!(ack, WebhookAck::Ignored);
    }

    #[tokio::test]
    async fn a_lost_race_is_retried_until_it_lands() {
        let mut fixture = Fixture::new();
        let order = sample_order(OrderStatus::PendingPayment);
        let order_id = order.id;

        let event = provider_event(
            "payment.authorized",
            ProviderEventKind::PaymentAuthorized {
                order_id,
                provider_ref: "hold_abc".to_string(),
                amount_minor: 4_900,
            },
        );
        fixture
            .gateway
            .expect_verify_webhook_signature()
            .returning(move |_, _| Ok(event.clone()));
        fixture
            .webhook_events
            .expect_record_received()
            .returning(|_| Box::pin(async { Ok(ReceivedEventDisposition::New) }));
        fixture.orders.expect_find_by_id().returning(move |_| {
            let order = order.clone();
            Box::pin(async move { Ok(Some(order)) })
        });
        let calls = AtomicUsize::new(0);
        fixture
            .orders
            .expect_transition_status()
            .returning(move |_| {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                Box::pin(async move {
                    if call == 0 {
                        Ok(TransitionOutcome::Conflict)
                    } else {
                        Ok(TransitionOutcome::Applied)
                    }
                })
            });
        fixture
            .webhook_events
            .expect_mark_processed()
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));

        let usecase = fixture.build();
        let ack = usecase
            .handle_delivery(b"{}", "t=1,v1=aa")
            .await
            .unwrap();
        assert_eq!(ack, WebhookAck::Processed);
    }

    #[tokio::test]
    async fn a_contradicting_event_is_acknowledged_for_review() {
        let mut fixture = Fixture::new();
        let order = sample_order(OrderStatus::PendingPayment);
        let order_id = order.id;

        // the provider reports an amount that does not match the order
        let event = provider_event(
            "payment.authorized",
            ProviderEventKind::PaymentAuthorized {
                order_id,
                provider_ref: "hold_abc".to_string(),
                amount_minor: 9_999,
            },
        );
        fixture
            .gateway
            .expect_verify_webhook_signature()
            .returning(move |_, _| Ok(event.clone()));
        fixture
            .webhook_events
            .expect_record_received()
            .returning(|_| Box::pin(async { Ok(ReceivedEventDisposition::New) }));
        fixture.orders.expect_find_by_id().returning(move |_| {
            let order = order.clone();
            Box::pin(async move { Ok(Some(order)) })
        });
        fixture
            .webhook_events
            .expect_mark_processed()
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));

        let usecase = fixture.build();
        let ack = usecase
            .handle_delivery(b"{}", "t=1,v1=aa")
            .await
            .unwrap();
        assert_eq!(ack, WebhookAck::Processed);
    }

    #[tokio::test]
    async fn a_repository_failure_leaves_the_event_unprocessed() {
        let mut fixture = Fixture::new();
        let event = provider_event(
            "payment.captured",
            ProviderEventKind::PaymentCaptured {
                order_id: Uuid::new_v4(),
                provider_ref: "hold_abc".to_string(),
                captured_minor: 4_900,
            },
        );
        fixture
            .gateway
            .expect_verify_webhook_signature()
            .returning(move |_, _| Ok(event.clone()));
        fixture
            .webhook_events
            .expect_record_received()
            .returning(|_| Box::pin(async { Ok(ReceivedEventDisposition::New) }));
        fixture
            .holds
            .expect_mark_captured()
            .returning(|_, _| Box::pin(async { Err(anyhow::anyhow!("connection reset")) }));
        // note: no mark_processed expectation; the mock panics if it is called

        let usecase = fixture.build();
        let result = usecase.handle_delivery(b"{}", "t=1,v1=aa").await;
        assert!(result.is_err());
    }
}
