use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use domain::entities::disputes::InsertDisputeEntity;
use domain::repositories::disputes::DisputeRepository;
use domain::repositories::events::DomainEventPublisher;
use domain::repositories::orders::OrderRepository;
use domain::value_objects::disputes::{
    DisputeDto, DisputeOpenOutcome, DisputeSettlementSummary, OpenDisputeRequest,
    ResolveDisputeRequest, ResolveWriteOutcome,
};
use domain::value_objects::enums::dispute_reasons::DisputeReason;
use domain::value_objects::enums::dispute_resolutions::DisputeResolution;
use domain::value_objects::enums::dispute_statuses::DisputeStatus;
use domain::value_objects::enums::order_statuses::OrderStatus;
use domain::value_objects::events::DomainEvent;
use domain::value_objects::orders::{StatusWrite, TransitionOutcome, TransitionStamp};

use crate::error::{FlowResult, OrderFlowError};
use crate::usecases::order_lifecycle::{CompletionTrigger, OrderLifecycleUseCase};

const OPEN_TRANSITION_ATTEMPTS: usize = 3;

/// Buyer-initiated disputes and their operator resolutions.
///
/// Opening freezes the order (no completion, no payout) until a resolver
/// picks one of the four outcomes; the money side of a resolution is driven
/// through the lifecycle use case so it shares the capture/refund/payout
/// machinery with the ordinary flows.
pub struct DisputeUseCase {
    orders: Arc<dyn OrderRepository + Send + Sync>,
    disputes: Arc<dyn DisputeRepository + Send + Sync>,
    lifecycle: Arc<OrderLifecycleUseCase>,
    events: Arc<dyn DomainEventPublisher + Send + Sync>,
}

impl DisputeUseCase {
    pub fn new(
        orders: Arc<dyn OrderRepository + Send + Sync>,
        disputes: Arc<dyn DisputeRepository + Send + Sync>,
        lifecycle: Arc<OrderLifecycleUseCase>,
        events: Arc<dyn DomainEventPublisher + Send + Sync>,
    ) -> Self {
        Self {
            orders,
            disputes,
            lifecycle,
            events,
        }
    }

    pub async fn open(&self, request: OpenDisputeRequest) -> FlowResult<DisputeDto> {
        let order = self
            .orders
            .find_by_id(request.order_id)
            .await?
            .ok_or(OrderFlowError::NotFound("order"))?;

        if order.buyer_id != request.buyer_id {
            return Err(OrderFlowError::NotAllowed("buyer"));
        }

        let status = order.parse_status()?;
        if !matches!(status, OrderStatus::Delivered | OrderStatus::Revision) {
            return Err(OrderFlowError::OrderNotDisputable {
                status: status.to_string(),
            });
        }

        match order.disputable_until {
            Some(until) if Utc::now() <= until => {}
            _ => return Err(OrderFlowError::DisputeWindowExpired),
        }

        if DisputeReason::from_str(&request.reason_code).is_none() {
            return Err(OrderFlowError::Validation(format!(
                "unknown dispute reason {:?}",
                request.reason_code
            )));
        }

        let dispute_id = match self
            .disputes
            .open(InsertDisputeEntity {
                order_id: order.id,
                opened_by: request.buyer_id,
                reason_code: request.reason_code.clone(),
                description: request.description.clone(),
                evidence_refs: serde_json::json!(request.evidence_refs),
                status: DisputeStatus::Open.to_string(),
                resolution: DisputeResolution::Pending.to_string(),
            })
            .await?
        {
            DisputeOpenOutcome::Created(dispute_id) => dispute_id,
            DisputeOpenOutcome::AlreadyOpen => return Err(OrderFlowError::DisputeAlreadyExists),
        };

        self.freeze_order(order.id).await?;

        if let Err(err) = self
            .events
            .publish(DomainEvent::DisputeOpened {
                dispute_id,
                order_id: order.id,
                opened_by: request.buyer_id,
            })
            .await
        {
            warn!(error = ?err, "disputes: failed to publish dispute opened event");
        }

        info!(
            order_id = %order.id,
            %dispute_id,
            reason_code = %request.reason_code,
            "disputes: dispute opened, order frozen"
        );

        let dispute = self
            .disputes
            .find_by_id(dispute_id)
            .await?
            .ok_or_else(|| {
                OrderFlowError::Internal(anyhow::anyhow!(
                    "dispute {dispute_id} vanished right after insert"
                ))
            })?;
        Ok(dispute.into())
    }

    pub async fn resolve(
        &self,
        dispute_id: Uuid,
        request: ResolveDisputeRequest,
    ) -> FlowResult<DisputeSettlementSummary> {
        let dispute = self
            .disputes
            .find_by_id(dispute_id)
            .await?
            .ok_or(OrderFlowError::NotFound("dispute"))?;
        let order_id = dispute.order_id;

        let Some(resolution) = DisputeResolution::from_str(&request.decision) else {
            return Err(OrderFlowError::Validation(format!(
                "unknown dispute decision {:?}",
                request.decision
            )));
        };

        let refund_percent = match resolution {
            DisputeResolution::Pending => {
                return Err(OrderFlowError::Validation(
                    "pending is not a resolution".to_string(),
                ));
            }
            DisputeResolution::FullRefund => match request.refund_percent {
                None | Some(100) => 100,
                Some(other) => {
                    return Err(OrderFlowError::Validation(format!(
                        "a full refund implies 100 percent, got {other}"
                    )));
                }
            },
            DisputeResolution::PartialRefund => match request.refund_percent {
                Some(percent) if (1..=99).contains(&percent) => percent,
                Some(percent) => {
                    return Err(OrderFlowError::Validation(format!(
                        "partial refund percent must be within 1..=99, got {percent}"
                    )));
                }
                None => {
                    return Err(OrderFlowError::Validation(
                        "a partial refund requires a refund percent".to_string(),
                    ));
                }
            },
            DisputeResolution::Revision | DisputeResolution::NoAction => {
                match request.refund_percent {
                    None | Some(0) => 0,
                    Some(other) => {
                        return Err(OrderFlowError::Validation(format!(
                            "resolution {resolution} does not refund, got {other} percent"
                        )));
                    }
                }
            }
        };

        // The resolution row is written first so a crash while settling can
        // be re-driven from it (by the next webhook or an operator retry).
        match self
            .disputes
            .resolve(
                dispute_id,
                resolution.to_string(),
                refund_percent as i32,
                request.admin_notes.clone(),
                Utc::now(),
            )
            .await?
        {
            ResolveWriteOutcome::Applied => {}
            ResolveWriteOutcome::AlreadyResolved => {
                return Err(OrderFlowError::DisputeAlreadyResolved);
            }
        }

        let (refund_minor, retained_minor, order_status) = match resolution {
            DisputeResolution::FullRefund | DisputeResolution::PartialRefund => {
                let outcome = self
                    .lifecycle
                    .settle_with_refund(order_id, refund_percent)
                    .await?;
                (
                    outcome.refund_minor,
                    outcome.retained_minor,
                    outcome.order_status,
                )
            }
            DisputeResolution::Revision => {
                self.lifecycle.return_for_revision(order_id).await?;
                (0, 0, OrderStatus::Revision)
            }
            DisputeResolution::NoAction => {
                self.lifecycle
                    .complete(order_id, CompletionTrigger::DisputeResolution)
                    .await?;
                let order = self
                    .orders
                    .find_by_id(order_id)
                    .await?
                    .ok_or(OrderFlowError::NotFound("order"))?;
                (0, order.total_amount_minor, OrderStatus::Completed)
            }
            DisputeResolution::Pending => {
                return Err(OrderFlowError::Validation(
                    "pending is not a resolution".to_string(),
                ));
            }
        };

        if let Err(err) = self
            .events
            .publish(DomainEvent::DisputeResolved {
                dispute_id,
                order_id,
                resolution,
                refund_minor,
                order_status,
            })
            .await
        {
            warn!(error = ?err, "disputes: failed to publish dispute resolved event");
        }

        info!(
            %dispute_id,
            %order_id,
            %resolution,
            refund_minor,
            retained_minor,
            "disputes: dispute resolved"
        );

        Ok(DisputeSettlementSummary {
            dispute_id,
            order_id,
            resolution: resolution.to_string(),
            refund_minor,
            retained_minor,
            order_status: order_status.to_string(),
        })
    }

    pub async fn get(&self, dispute_id: Uuid) -> FlowResult<DisputeDto> {
        let dispute = self
            .disputes
            .find_by_id(dispute_id)
            .await?
            .ok_or(OrderFlowError::NotFound("dispute"))?;
        Ok(dispute.into())
    }

    /// Moves the order to `disputed`, retrying around concurrent buyer or
    /// seller transitions. The dispute row already exists at this point, so
    /// completion is blocked either way; the status flip is what stops the
    /// cheap transitions too.
    async fn freeze_order(&self, order_id: Uuid) -> FlowResult<()> {
        for _ in 0..OPEN_TRANSITION_ATTEMPTS {
            let order = self
                .orders
                .find_by_id(order_id)
                .await?
                .ok_or(OrderFlowError::NotFound("order"))?;
            let status = order.parse_status()?;

            match status {
                OrderStatus::Disputed => return Ok(()),
                OrderStatus::Delivered | OrderStatus::Revision => {
                    let write = StatusWrite {
                        order_id,
                        expected_version: order.version,
                        from: status,
                        to: OrderStatus::Disputed,
                        stamp: TransitionStamp::None,
                    };
                    match self.orders.transition_status(write).await? {
                        TransitionOutcome::Applied => return Ok(()),
                        TransitionOutcome::Conflict => continue,
                    }
                }
                other => {
                    // the order slipped into a non-disputable status between
                    // the window check and the insert; the open dispute row
                    // stays for an operator to resolve by hand
                    warn!(
                        %order_id,
                        status = %other,
                        "disputes: order left the disputable statuses while opening"
                    );
                    return Err(OrderFlowError::OrderNotDisputable {
                        status: other.to_string(),
                    });
                }
            }
        }
        Err(OrderFlowError::ConcurrentModification)
    }
}
