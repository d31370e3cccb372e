use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use domain::entities::escrow_holds::EscrowHoldEntity;
use domain::entities::orders::OrderEntity;
use domain::entities::settlements::InsertSettlementEntity;
use domain::fees::{MAX_REFUND_PERCENT, compute_refund, compute_split};
use domain::repositories::disputes::DisputeRepository;
use domain::repositories::escrow_gateway::EscrowGateway;
use domain::repositories::escrow_holds::EscrowHoldRepository;
use domain::repositories::events::DomainEventPublisher;
use domain::repositories::orders::OrderRepository;
use domain::repositories::payout_profiles::PayoutProfileRepository;
use domain::repositories::settlements::SettlementRepository;
use domain::value_objects::enums::actor_roles::ActorRole;
use domain::value_objects::enums::dispute_resolutions::DisputeResolution;
use domain::value_objects::enums::escrow_states::EscrowState;
use domain::value_objects::enums::order_statuses::OrderStatus;
use domain::value_objects::enums::payout_statuses::PayoutStatus;
use domain::value_objects::events::DomainEvent;
use domain::value_objects::gateway::{ProviderCallOutcome, idempotency_key};
use domain::value_objects::orders::{
    ClaimOutcome, OrderDetailsDto, StatusWrite, TransitionOutcome, TransitionStamp,
};
use domain::value_objects::policy::{FeePolicy, LifecyclePolicy};

use crate::error::{FlowResult, OrderFlowError};

/// What asked for an order to be completed. Buyer acceptance checks the
/// acting party; dispute resolution is the only trigger allowed to complete
/// out of `disputed`; reconciled capture events re-drive completions that
/// stalled between a gateway call and the final status write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionTrigger {
    BuyerAccept { buyer_id: Uuid },
    AutoAccept,
    DisputeResolution,
    CaptureReconciled,
}

/// Money outcome of a refund-bearing dispute resolution.
#[derive(Debug, Clone)]
pub struct RefundSettlement {
    pub refund_minor: i64,
    pub retained_minor: i64,
    pub order_status: OrderStatus,
}

/// Drives the order state machine and the escrow money movements behind it.
///
/// Every path that talks to the payment provider claims the order row first
/// (a version bump) so concurrent transitions lose the compare-and-set before
/// any money moves, then performs provider calls under deterministic
/// idempotency keys, and only then writes the final status.
pub struct OrderLifecycleUseCase {
    orders: Arc<dyn OrderRepository + Send + Sync>,
    escrow_holds: Arc<dyn EscrowHoldRepository + Send + Sync>,
    settlements: Arc<dyn SettlementRepository + Send + Sync>,
    disputes: Arc<dyn DisputeRepository + Send + Sync>,
    payout_profiles: Arc<dyn PayoutProfileRepository + Send + Sync>,
    gateway: Arc<dyn EscrowGateway + Send + Sync>,
    events: Arc<dyn DomainEventPublisher + Send + Sync>,
    fee_policy: FeePolicy,
    lifecycle_policy: LifecyclePolicy,
}

impl OrderLifecycleUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        orders: Arc<dyn OrderRepository + Send + Sync>,
        escrow_holds: Arc<dyn EscrowHoldRepository + Send + Sync>,
        settlements: Arc<dyn SettlementRepository + Send + Sync>,
        disputes: Arc<dyn DisputeRepository + Send + Sync>,
        payout_profiles: Arc<dyn PayoutProfileRepository + Send + Sync>,
        gateway: Arc<dyn EscrowGateway + Send + Sync>,
        events: Arc<dyn DomainEventPublisher + Send + Sync>,
        fee_policy: FeePolicy,
        lifecycle_policy: LifecyclePolicy,
    ) -> Self {
        Self {
            orders,
            escrow_holds,
            settlements,
            disputes,
            payout_profiles,
            gateway,
            events,
            fee_policy,
            lifecycle_policy,
        }
    }

    /// payment.authorized confirmation: pending_payment -> accepted. A replay
    /// for an order already past pending_payment is a no-op.
    pub async fn mark_payment_authorized(
        &self,
        order_id: Uuid,
        provider_ref: &str,
        amount_minor: i64,
    ) -> FlowResult<()> {
        let order = self.load_order(order_id).await?;
        let status = order.parse_status()?;

        if status != OrderStatus::PendingPayment {
            info!(
                %order_id,
                %status,
                "order_lifecycle: payment.authorized for an order already past pending_payment"
            );
            return Ok(());
        }

        if order.provider_payment_ref.as_deref() != Some(provider_ref) {
            error!(
                %order_id,
                provider_ref,
                "order_lifecycle: payment.authorized does not match the stored hold ref"
            );
            return Err(OrderFlowError::Validation(
                "authorized event does not match the order's hold".to_string(),
            ));
        }
        if amount_minor != order.total_amount_minor {
            error!(
                %order_id,
                amount_minor,
                total_amount_minor = order.total_amount_minor,
                "order_lifecycle: authorized amount does not match the order total"
            );
            return Err(OrderFlowError::Validation(
                "authorized amount does not match the order total".to_string(),
            ));
        }

        self.apply_transition(
            order.id,
            order.version,
            OrderStatus::PendingPayment,
            OrderStatus::Accepted,
            TransitionStamp::None,
        )
        .await?;

        self.publish(DomainEvent::OrderAccepted {
            order_id,
            buyer_id: order.buyer_id,
            seller_id: order.seller_id,
        })
        .await;

        info!(%order_id, "order_lifecycle: payment confirmed, order accepted");
        Ok(())
    }

    /// payment.failed confirmation: pending_payment -> cancelled, hold voided.
    pub async fn mark_payment_failed(&self, order_id: Uuid, reason: &str) -> FlowResult<()> {
        let order = self.load_order(order_id).await?;
        let status = order.parse_status()?;

        if status != OrderStatus::PendingPayment {
            warn!(
                %order_id,
                %status,
                "order_lifecycle: payment.failed for an order no longer pending; ignoring"
            );
            return Ok(());
        }

        self.escrow_holds.mark_voided(order_id).await?;
        self.apply_transition(
            order.id,
            order.version,
            OrderStatus::PendingPayment,
            OrderStatus::Cancelled,
            TransitionStamp::Cancelled {
                cancelled_by: "system".to_string(),
                cancel_reason: Some(format!("payment failed: {reason}")),
            },
        )
        .await?;

        self.publish(DomainEvent::OrderCancelled {
            order_id,
            buyer_id: order.buyer_id,
            seller_id: order.seller_id,
            refunded_minor: 0,
        })
        .await;

        info!(%order_id, reason, "order_lifecycle: payment failed, order cancelled");
        Ok(())
    }

    /// accepted -> in_progress, by the order's seller.
    pub async fn start_work(&self, order_id: Uuid, seller_id: Uuid) -> FlowResult<()> {
        let order = self.load_order(order_id).await?;
        if order.seller_id != seller_id {
            return Err(OrderFlowError::NotAllowed("seller"));
        }

        let status = order.parse_status()?;
        if status == OrderStatus::InProgress {
            info!(%order_id, "order_lifecycle: start_work retried, already in progress");
            return Ok(());
        }
        if status != OrderStatus::Accepted {
            return Err(OrderFlowError::InvalidTransition {
                from: status,
                to: OrderStatus::InProgress,
            });
        }

        self.apply_transition(
            order.id,
            order.version,
            OrderStatus::Accepted,
            OrderStatus::InProgress,
            TransitionStamp::None,
        )
        .await?;

        info!(%order_id, "order_lifecycle: seller started work");
        Ok(())
    }

    /// in_progress -> delivered. Stamps the review deadline and the dispute
    /// window; a redelivery after revision stamps fresh ones.
    pub async fn deliver(&self, order_id: Uuid, seller_id: Uuid) -> FlowResult<()> {
        let order = self.load_order(order_id).await?;
        if order.seller_id != seller_id {
            return Err(OrderFlowError::NotAllowed("seller"));
        }

        let status = order.parse_status()?;
        if status == OrderStatus::Delivered {
            // a retried deliver must not restamp the review window
            info!(%order_id, "order_lifecycle: deliver retried, already delivered");
            return Ok(());
        }
        if status != OrderStatus::InProgress {
            return Err(OrderFlowError::InvalidTransition {
                from: status,
                to: OrderStatus::Delivered,
            });
        }

        let now = Utc::now();
        let review_deadline = now + self.lifecycle_policy.review_period();
        let disputable_until = now + self.lifecycle_policy.dispute_window();

        self.apply_transition(
            order.id,
            order.version,
            OrderStatus::InProgress,
            OrderStatus::Delivered,
            TransitionStamp::Delivered {
                delivered_at: now,
                review_deadline,
                disputable_until,
            },
        )
        .await?;

        self.publish(DomainEvent::OrderDelivered {
            order_id,
            buyer_id: order.buyer_id,
            seller_id: order.seller_id,
        })
        .await;

        info!(%order_id, %review_deadline, "order_lifecycle: delivered, review window open");
        Ok(())
    }

    /// delivered -> revision, by the buyer, while revision slots remain. The
    /// slot count is also guarded inside the status write so two concurrent
    /// requests cannot spend the same slot.
    pub async fn request_revision(&self, order_id: Uuid, buyer_id: Uuid) -> FlowResult<()> {
        let order = self.load_order(order_id).await?;
        if order.buyer_id != buyer_id {
            return Err(OrderFlowError::NotAllowed("buyer"));
        }

        let status = order.parse_status()?;
        if status == OrderStatus::Revision {
            // a retry must not spend a second revision slot
            info!(%order_id, "order_lifecycle: revision request retried, already in revision");
            return Ok(());
        }
        if status != OrderStatus::Delivered {
            return Err(OrderFlowError::InvalidTransition {
                from: status,
                to: OrderStatus::Revision,
            });
        }
        if order.revision_count >= order.max_revisions {
            return Err(OrderFlowError::RevisionLimitExceeded {
                max: order.max_revisions,
            });
        }

        self.apply_transition(
            order.id,
            order.version,
            OrderStatus::Delivered,
            OrderStatus::Revision,
            TransitionStamp::RevisionRequested,
        )
        .await?;

        self.publish(DomainEvent::RevisionRequested {
            order_id,
            buyer_id: order.buyer_id,
            seller_id: order.seller_id,
            revision_count: order.revision_count + 1,
        })
        .await;

        info!(
            %order_id,
            revision_count = order.revision_count + 1,
            max_revisions = order.max_revisions,
            "order_lifecycle: buyer requested a revision"
        );
        Ok(())
    }

    /// revision -> in_progress, by the seller picking the rework up.
    pub async fn resume_work(&self, order_id: Uuid, seller_id: Uuid) -> FlowResult<()> {
        let order = self.load_order(order_id).await?;
        if order.seller_id != seller_id {
            return Err(OrderFlowError::NotAllowed("seller"));
        }

        let status = order.parse_status()?;
        if status == OrderStatus::InProgress {
            info!(%order_id, "order_lifecycle: resume_work retried, already in progress");
            return Ok(());
        }
        if status != OrderStatus::Revision {
            return Err(OrderFlowError::InvalidTransition {
                from: status,
                to: OrderStatus::InProgress,
            });
        }

        self.apply_transition(
            order.id,
            order.version,
            OrderStatus::Revision,
            OrderStatus::InProgress,
            TransitionStamp::None,
        )
        .await?;

        info!(%order_id, "order_lifecycle: seller resumed work after revision request");
        Ok(())
    }

    /// Completes the order: freezes the fee split, captures the escrow hold,
    /// initiates the seller payout and writes the final status. Safe to call
    /// again after a crash; every money step skips itself once done.
    pub async fn complete(&self, order_id: Uuid, trigger: CompletionTrigger) -> FlowResult<()> {
        let order = self.load_order(order_id).await?;
        let status = order.parse_status()?;

        if status == OrderStatus::Completed {
            info!(%order_id, ?trigger, "order_lifecycle: order already completed");
            return Ok(());
        }

        let from = match trigger {
            CompletionTrigger::DisputeResolution => OrderStatus::Disputed,
            _ => OrderStatus::Delivered,
        };
        if status != from {
            return Err(OrderFlowError::InvalidTransition {
                from: status,
                to: OrderStatus::Completed,
            });
        }

        if let CompletionTrigger::BuyerAccept { buyer_id } = trigger {
            if order.buyer_id != buyer_id {
                return Err(OrderFlowError::NotAllowed("buyer"));
            }
        }

        if trigger != CompletionTrigger::DisputeResolution
            && self.disputes.has_unresolved_for_order(order_id).await?
        {
            return Err(OrderFlowError::DisputePending);
        }

        let claimed_version = self.claim(order.id, order.version, from).await?;

        let split = compute_split(order.total_amount_minor, self.fee_policy.fee_bps)
            .map_err(|err| OrderFlowError::Internal(anyhow::anyhow!(err)))?;

        // The split is written before any capture so a crash between the
        // gateway call and the status write can be reconciled from the row.
        self.settlements
            .upsert_for_order(InsertSettlementEntity {
                order_id,
                gross_minor: order.total_amount_minor,
                fee_minor: split.fee_minor,
                seller_earnings_minor: split.seller_earnings_minor,
                fee_bps: self.fee_policy.fee_bps as i32,
                fee_policy_version: self.fee_policy.version.clone(),
                payout_status: PayoutStatus::Pending.to_string(),
                computed_at: Utc::now(),
            })
            .await?;

        let hold = self.load_hold(order_id).await?;
        self.capture_if_needed(&order, &hold).await?;
        self.initiate_payout(&order, split.seller_earnings_minor, hold.attempt_generation)
            .await?;

        self.apply_transition(
            order.id,
            claimed_version,
            from,
            OrderStatus::Completed,
            TransitionStamp::None,
        )
        .await?;

        self.publish(DomainEvent::OrderCompleted {
            order_id,
            buyer_id: order.buyer_id,
            seller_id: order.seller_id,
            seller_earnings_minor: split.seller_earnings_minor,
        })
        .await;

        info!(
            %order_id,
            ?trigger,
            seller_earnings_minor = split.seller_earnings_minor,
            "order_lifecycle: order completed"
        );
        Ok(())
    }

    /// Cancels an order that has not reached delivery. Who may cancel depends
    /// on how far the work has gone; the escrow hold is voided (or refunded,
    /// when a capture raced ahead) before the status flips.
    pub async fn cancel(
        &self,
        order_id: Uuid,
        role: ActorRole,
        actor_id: Uuid,
        reason: Option<String>,
    ) -> FlowResult<()> {
        let order = self.load_order(order_id).await?;
        let status = order.parse_status()?;

        if status == OrderStatus::Cancelled {
            info!(%order_id, "order_lifecycle: order already cancelled");
            return Ok(());
        }

        let allowed = match role {
            ActorRole::Buyer => {
                if order.buyer_id != actor_id {
                    return Err(OrderFlowError::NotAllowed("buyer"));
                }
                matches!(
                    status,
                    OrderStatus::PendingPayment | OrderStatus::Accepted
                )
            }
            ActorRole::Seller => {
                if order.seller_id != actor_id {
                    return Err(OrderFlowError::NotAllowed("seller"));
                }
                matches!(
                    status,
                    OrderStatus::PendingPayment | OrderStatus::Accepted | OrderStatus::InProgress
                )
            }
            ActorRole::Operator => matches!(
                status,
                OrderStatus::PendingPayment | OrderStatus::Accepted | OrderStatus::InProgress
            ),
        };
        if !allowed {
            return Err(OrderFlowError::InvalidTransition {
                from: status,
                to: OrderStatus::Cancelled,
            });
        }

        let claimed_version = self.claim(order.id, order.version, status).await?;
        let hold = self.load_hold(order_id).await?;
        let refunded_minor = self.release_hold_to_buyer(&order, &hold).await?;

        self.apply_transition(
            order.id,
            claimed_version,
            status,
            OrderStatus::Cancelled,
            TransitionStamp::Cancelled {
                cancelled_by: role.to_string(),
                cancel_reason: reason,
            },
        )
        .await?;

        self.publish(DomainEvent::OrderCancelled {
            order_id,
            buyer_id: order.buyer_id,
            seller_id: order.seller_id,
            refunded_minor,
        })
        .await;

        info!(%order_id, cancelled_by = %role, refunded_minor, "order_lifecycle: order cancelled");
        Ok(())
    }

    /// Applies a refund-bearing dispute resolution: refunds the given percent
    /// of the order total to the buyer, settles the seller on the retained
    /// remainder, and moves the order to its final status (cancelled for a
    /// full refund, completed otherwise).
    pub async fn settle_with_refund(
        &self,
        order_id: Uuid,
        refund_percent: i64,
    ) -> FlowResult<RefundSettlement> {
        let order = self.load_order(order_id).await?;
        let status = order.parse_status()?;

        let refund_minor = compute_refund(order.total_amount_minor, refund_percent)
            .map_err(|err| OrderFlowError::Validation(err.to_string()))?;
        let retained_minor = order.total_amount_minor - refund_minor;

        if status.is_terminal() {
            info!(%order_id, %status, "order_lifecycle: refund settlement already applied");
            return Ok(RefundSettlement {
                refund_minor,
                retained_minor,
                order_status: status,
            });
        }
        if status != OrderStatus::Disputed {
            return Err(OrderFlowError::InvalidTransition {
                from: status,
                to: OrderStatus::Cancelled,
            });
        }

        let claimed_version = self.claim(order.id, order.version, OrderStatus::Disputed).await?;
        let hold = self.load_hold(order_id).await?;

        // A full refund on a hold that was never captured releases the hold
        // instead of moving money twice.
        if refund_percent == MAX_REFUND_PERCENT && hold.parse_state()? == EscrowState::Authorized {
            let key = idempotency_key(order.id, "void", hold.attempt_generation);
            match self.gateway.void(hold.provider_ref.clone(), key).await? {
                ProviderCallOutcome::Succeeded(_) => {
                    self.escrow_holds.mark_voided(order.id).await?;
                }
                ProviderCallOutcome::DefinitivelyFailed(decline) => {
                    self.escrow_holds.bump_attempt_generation(order.id).await?;
                    error!(
                        %order_id,
                        decline_code = ?decline.code,
                        "order_lifecycle: void declined during dispute settlement"
                    );
                    return Err(decline.into());
                }
                ProviderCallOutcome::Unknown(context) => {
                    warn!(%order_id, context = %context, "order_lifecycle: void outcome unknown");
                    return Err(OrderFlowError::ReconciliationPending);
                }
            }

            self.apply_transition(
                order.id,
                claimed_version,
                OrderStatus::Disputed,
                OrderStatus::Cancelled,
                Self::full_refund_stamp(),
            )
            .await?;

            info!(%order_id, refund_minor, "order_lifecycle: dispute settled, hold voided in full");
            return Ok(RefundSettlement {
                refund_minor,
                retained_minor: 0,
                order_status: OrderStatus::Cancelled,
            });
        }

        let split = if retained_minor > 0 {
            let split = compute_split(retained_minor, self.fee_policy.fee_bps)
                .map_err(|err| OrderFlowError::Internal(anyhow::anyhow!(err)))?;
            self.settlements
                .upsert_for_order(InsertSettlementEntity {
                    order_id,
                    gross_minor: retained_minor,
                    fee_minor: split.fee_minor,
                    seller_earnings_minor: split.seller_earnings_minor,
                    fee_bps: self.fee_policy.fee_bps as i32,
                    fee_policy_version: self.fee_policy.version.clone(),
                    payout_status: PayoutStatus::Pending.to_string(),
                    computed_at: Utc::now(),
                })
                .await?;
            Some(split)
        } else {
            None
        };

        self.capture_if_needed(&order, &hold).await?;

        if refund_minor > 0 {
            // re-read: the capture above may have advanced the hold
            let hold = self.load_hold(order_id).await?;
            if hold.refunded_minor < refund_minor {
                let key = idempotency_key(order.id, "refund", hold.attempt_generation);
                match self
                    .gateway
                    .refund(hold.provider_ref.clone(), refund_minor, key)
                    .await?
                {
                    ProviderCallOutcome::Succeeded(receipt) => {
                        self.escrow_holds
                            .record_refund_total(order.id, receipt.refunded_total_minor)
                            .await?;
                    }
                    ProviderCallOutcome::DefinitivelyFailed(decline) => {
                        self.escrow_holds.bump_attempt_generation(order.id).await?;
                        error!(
                            %order_id,
                            decline_code = ?decline.code,
                            "order_lifecycle: refund declined during dispute settlement"
                        );
                        return Err(decline.into());
                    }
                    ProviderCallOutcome::Unknown(context) => {
                        warn!(%order_id, context = %context, "order_lifecycle: refund outcome unknown");
                        return Err(OrderFlowError::ReconciliationPending);
                    }
                }
            }
        }

        let (final_status, stamp) = if retained_minor == 0 {
            (OrderStatus::Cancelled, Self::full_refund_stamp())
        } else {
            (OrderStatus::Completed, TransitionStamp::None)
        };

        if let Some(split) = split {
            self.initiate_payout(&order, split.seller_earnings_minor, hold.attempt_generation)
                .await?;
        }

        self.apply_transition(
            order.id,
            claimed_version,
            OrderStatus::Disputed,
            final_status,
            stamp,
        )
        .await?;

        info!(
            %order_id,
            refund_minor,
            retained_minor,
            final_status = %final_status,
            "order_lifecycle: dispute refund settled"
        );
        Ok(RefundSettlement {
            refund_minor,
            retained_minor,
            order_status: final_status,
        })
    }

    /// disputed -> revision on a resolver's order. Does not consume one of
    /// the buyer's revision slots.
    pub async fn return_for_revision(&self, order_id: Uuid) -> FlowResult<()> {
        let order = self.load_order(order_id).await?;
        let status = order.parse_status()?;

        if status == OrderStatus::Revision {
            return Ok(());
        }
        if status != OrderStatus::Disputed {
            return Err(OrderFlowError::InvalidTransition {
                from: status,
                to: OrderStatus::Revision,
            });
        }

        self.apply_transition(
            order.id,
            order.version,
            OrderStatus::Disputed,
            OrderStatus::Revision,
            TransitionStamp::None,
        )
        .await?;

        info!(%order_id, "order_lifecycle: dispute returned the order for revision");
        Ok(())
    }

    /// payment.captured confirmation: folds the amount into the hold, then
    /// re-drives whatever settlement the capture belongs to if it stalled.
    pub async fn reconcile_captured(&self, order_id: Uuid, captured_minor: i64) -> FlowResult<()> {
        self.escrow_holds.mark_captured(order_id, captured_minor).await?;
        self.redrive_settlement(order_id).await
    }

    /// payment.refunded confirmation. The provider reports the cumulative
    /// total, so replays are harmless.
    pub async fn reconcile_refunded(
        &self,
        order_id: Uuid,
        refunded_total_minor: i64,
    ) -> FlowResult<()> {
        self.escrow_holds
            .record_refund_total(order_id, refunded_total_minor)
            .await?;
        self.redrive_settlement(order_id).await
    }

    /// payout.completed confirmation: the transfer landed, the escrow is
    /// released to the seller.
    pub async fn reconcile_payout_completed(
        &self,
        order_id: Uuid,
        transfer_ref: String,
    ) -> FlowResult<()> {
        self.settlements
            .mark_payout_completed(order_id, transfer_ref)
            .await?;
        self.escrow_holds.mark_released(order_id).await?;
        info!(%order_id, "order_lifecycle: payout confirmed, escrow released to seller");
        self.redrive_settlement(order_id).await
    }

    /// payout.failed confirmation. The completion stands; the payout is
    /// retried out of band once the seller's account is fixed.
    pub async fn reconcile_payout_failed(&self, order_id: Uuid, reason: String) -> FlowResult<()> {
        warn!(%order_id, reason = %reason, "order_lifecycle: payout failed at the provider");
        self.settlements.mark_payout_failed(order_id, reason).await?;
        Ok(())
    }

    pub async fn get_order_details(&self, order_id: Uuid) -> FlowResult<OrderDetailsDto> {
        let order = self.load_order(order_id).await?;
        let line_items = self.orders.list_line_items(order_id).await?;
        let escrow = self.escrow_holds.find_by_order(order_id).await?;
        let settlement = self.settlements.find_by_order(order_id).await?;
        let dispute = self.disputes.find_by_order(order_id).await?;

        Ok(OrderDetailsDto {
            order: order.into(),
            line_items: line_items.into_iter().map(Into::into).collect(),
            escrow: escrow.map(Into::into),
            settlement: settlement.map(Into::into),
            dispute: dispute.map(Into::into),
        })
    }

    /// A money event landed for this order; if a completion or dispute
    /// settlement stalled mid-way (crash, ambiguous provider answer), finish
    /// it now from local state.
    async fn redrive_settlement(&self, order_id: Uuid) -> FlowResult<()> {
        let order = self.load_order(order_id).await?;
        match order.parse_status()? {
            OrderStatus::Delivered => {
                if self.disputes.has_unresolved_for_order(order_id).await? {
                    // frozen under an open dispute; its resolution drives the rest
                    return Ok(());
                }
                info!(%order_id, "order_lifecycle: money event re-driving a stalled completion");
                self.complete(order_id, CompletionTrigger::CaptureReconciled).await
            }
            OrderStatus::Disputed => {
                let Some(dispute) = self.disputes.find_by_order(order_id).await? else {
                    warn!(%order_id, "order_lifecycle: disputed order has no dispute row");
                    return Ok(());
                };
                match DisputeResolution::from_str(&dispute.resolution) {
                    Some(DisputeResolution::FullRefund) | Some(DisputeResolution::PartialRefund) => {
                        let Some(percent) = dispute.refund_percent else {
                            warn!(
                                %order_id,
                                dispute_id = %dispute.id,
                                "order_lifecycle: resolved refund dispute has no stored percent"
                            );
                            return Ok(());
                        };
                        info!(
                            %order_id,
                            percent,
                            "order_lifecycle: money event re-driving a stalled dispute settlement"
                        );
                        self.settle_with_refund(order_id, i64::from(percent))
                            .await
                            .map(|_| ())
                    }
                    _ => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }

    async fn capture_if_needed(
        &self,
        order: &OrderEntity,
        hold: &EscrowHoldEntity,
    ) -> FlowResult<()> {
        match hold.parse_state()? {
            EscrowState::Captured | EscrowState::ReleasedToSeller => Ok(()),
            EscrowState::Authorized => {
                let key = idempotency_key(order.id, "capture", hold.attempt_generation);
                match self
                    .gateway
                    .capture(hold.provider_ref.clone(), order.total_amount_minor, key)
                    .await?
                {
                    ProviderCallOutcome::Succeeded(receipt) => {
                        self.escrow_holds
                            .mark_captured(order.id, receipt.captured_minor)
                            .await?;
                        info!(
                            order_id = %order.id,
                            captured_minor = receipt.captured_minor,
                            "order_lifecycle: escrow hold captured"
                        );
                        Ok(())
                    }
                    ProviderCallOutcome::DefinitivelyFailed(decline) => {
                        self.escrow_holds.bump_attempt_generation(order.id).await?;
                        error!(
                            order_id = %order.id,
                            decline_code = ?decline.code,
                            "order_lifecycle: capture declined"
                        );
                        Err(decline.into())
                    }
                    ProviderCallOutcome::Unknown(context) => {
                        warn!(
                            order_id = %order.id,
                            context = %context,
                            "order_lifecycle: capture outcome unknown, awaiting provider webhook"
                        );
                        Err(OrderFlowError::ReconciliationPending)
                    }
                }
            }
            state => Err(OrderFlowError::Internal(anyhow::anyhow!(
                "cannot settle order {} with escrow in state {state}",
                order.id
            ))),
        }
    }

    async fn initiate_payout(
        &self,
        order: &OrderEntity,
        earnings_minor: i64,
        attempt_generation: i32,
    ) -> FlowResult<()> {
        if earnings_minor <= 0 {
            return Ok(());
        }

        if let Some(settlement) = self.settlements.find_by_order(order.id).await? {
            if settlement.payout_ref.is_some()
                || settlement.payout_status != PayoutStatus::Pending.as_str()
            {
                // a previous attempt already initiated (or finished) the transfer
                return Ok(());
            }
        }

        let Some(account_ref) = self
            .payout_profiles
            .find_active_account_ref(order.seller_id)
            .await?
        else {
            warn!(
                order_id = %order.id,
                seller_id = %order.seller_id,
                "order_lifecycle: seller has no active payout profile; payout marked failed"
            );
            self.settlements
                .mark_payout_failed(order.id, "seller payout profile missing or inactive".to_string())
                .await?;
            return Ok(());
        };

        let key = idempotency_key(order.id, "transfer", attempt_generation);
        match self
            .gateway
            .transfer_to_seller(account_ref, earnings_minor, key)
            .await?
        {
            ProviderCallOutcome::Succeeded(receipt) => {
                self.settlements
                    .record_payout_initiated(order.id, receipt.transfer_ref.clone())
                    .await?;
                info!(
                    order_id = %order.id,
                    transfer_ref = %receipt.transfer_ref,
                    earnings_minor,
                    "order_lifecycle: seller payout initiated"
                );
            }
            ProviderCallOutcome::DefinitivelyFailed(decline) => {
                // the completion stands; a failed payout is a seller-side
                // problem, surfaced on the settlement
                error!(
                    order_id = %order.id,
                    decline_code = ?decline.code,
                    "order_lifecycle: payout initiation declined"
                );
                self.settlements
                    .mark_payout_failed(order.id, decline.message)
                    .await?;
            }
            ProviderCallOutcome::Unknown(context) => {
                // leave the payout pending without a ref; the payout webhook
                // settles it either way
                warn!(
                    order_id = %order.id,
                    context = %context,
                    "order_lifecycle: payout initiation outcome unknown"
                );
            }
        }

        Ok(())
    }

    async fn release_hold_to_buyer(
        &self,
        order: &OrderEntity,
        hold: &EscrowHoldEntity,
    ) -> FlowResult<i64> {
        match hold.parse_state()? {
            EscrowState::Voided | EscrowState::Refunded => Ok(order.total_amount_minor),
            EscrowState::Authorized => {
                let key = idempotency_key(order.id, "void", hold.attempt_generation);
                match self.gateway.void(hold.provider_ref.clone(), key).await? {
                    ProviderCallOutcome::Succeeded(_) => {
                        self.escrow_holds.mark_voided(order.id).await?;
                        Ok(order.total_amount_minor)
                    }
                    ProviderCallOutcome::DefinitivelyFailed(decline) => {
                        self.escrow_holds.bump_attempt_generation(order.id).await?;
                        error!(
                            order_id = %order.id,
                            decline_code = ?decline.code,
                            "order_lifecycle: void declined during cancel"
                        );
                        Err(decline.into())
                    }
                    ProviderCallOutcome::Unknown(context) => {
                        warn!(
                            order_id = %order.id,
                            context = %context,
                            "order_lifecycle: void outcome unknown during cancel"
                        );
                        Err(OrderFlowError::ReconciliationPending)
                    }
                }
            }
            EscrowState::Captured => {
                // a capture raced ahead of this cancel; give it all back
                let key = idempotency_key(order.id, "refund", hold.attempt_generation);
                match self
                    .gateway
                    .refund(hold.provider_ref.clone(), hold.captured_minor, key)
                    .await?
                {
                    ProviderCallOutcome::Succeeded(receipt) => {
                        self.escrow_holds
                            .record_refund_total(order.id, receipt.refunded_total_minor)
                            .await?;
                        Ok(hold.captured_minor)
                    }
                    ProviderCallOutcome::DefinitivelyFailed(decline) => {
                        self.escrow_holds.bump_attempt_generation(order.id).await?;
                        Err(decline.into())
                    }
                    ProviderCallOutcome::Unknown(context) => {
                        warn!(
                            order_id = %order.id,
                            context = %context,
                            "order_lifecycle: refund outcome unknown during cancel"
                        );
                        Err(OrderFlowError::ReconciliationPending)
                    }
                }
            }
            EscrowState::ReleasedToSeller => Err(OrderFlowError::Internal(anyhow::anyhow!(
                "cannot cancel order {}: funds already released to the seller",
                order.id
            ))),
        }
    }

    async fn claim(
        &self,
        order_id: Uuid,
        expected_version: i64,
        status: OrderStatus,
    ) -> FlowResult<i64> {
        match self
            .orders
            .claim_transition(order_id, expected_version, status.to_string())
            .await?
        {
            ClaimOutcome::Claimed { version } => Ok(version),
            ClaimOutcome::Conflict => Err(OrderFlowError::ConcurrentModification),
        }
    }

    async fn apply_transition(
        &self,
        order_id: Uuid,
        expected_version: i64,
        from: OrderStatus,
        to: OrderStatus,
        stamp: TransitionStamp,
    ) -> FlowResult<()> {
        let write = StatusWrite {
            order_id,
            expected_version,
            from,
            to,
            stamp,
        };
        match self.orders.transition_status(write).await? {
            TransitionOutcome::Applied => Ok(()),
            TransitionOutcome::Conflict => {
                let fresh = self.load_order(order_id).await?;
                if fresh.parse_status()? == to {
                    // someone else finished the same transition; nothing lost
                    Ok(())
                } else {
                    Err(OrderFlowError::ConcurrentModification)
                }
            }
        }
    }

    async fn load_order(&self, order_id: Uuid) -> FlowResult<OrderEntity> {
        self.orders
            .find_by_id(order_id)
            .await?
            .ok_or(OrderFlowError::NotFound("order"))
    }

    async fn load_hold(&self, order_id: Uuid) -> FlowResult<EscrowHoldEntity> {
        self.escrow_holds
            .find_by_order(order_id)
            .await?
            .ok_or_else(|| {
                OrderFlowError::Internal(anyhow::anyhow!("order {order_id} has no escrow hold"))
            })
    }

    async fn publish(&self, event: DomainEvent) {
        if let Err(err) = self.events.publish(event).await {
            warn!(error = ?err, "order_lifecycle: failed to publish domain event");
        }
    }

    fn full_refund_stamp() -> TransitionStamp {
        TransitionStamp::Cancelled {
            cancelled_by: ActorRole::Operator.to_string(),
            cancel_reason: Some("dispute resolved with a full refund".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use domain::repositories::disputes::MockDisputeRepository;
    use domain::repositories::escrow_gateway::MockEscrowGateway;
    use domain::repositories::escrow_holds::MockEscrowHoldRepository;
    use domain::repositories::events::MockDomainEventPublisher;
    use domain::repositories::orders::MockOrderRepository;
    use domain::repositories::payout_profiles::MockPayoutProfileRepository;
    use domain::repositories::settlements::MockSettlementRepository;
    use domain::value_objects::gateway::{
        CaptureReceipt, DeclineCode, ProviderDecline, RefundReceipt, TransferReceipt, VoidReceipt,
    };
    use mockall::predicate::eq;

    struct Fixture {
        orders: MockOrderRepository,
        holds: MockEscrowHoldRepository,
        settlements: MockSettlementRepository,
        disputes: MockDisputeRepository,
        profiles: MockPayoutProfileRepository,
        gateway: MockEscrowGateway,
        events: MockDomainEventPublisher,
    }

    impl Fixture {
        fn new() -> Self {
            let mut events = MockDomainEventPublisher::new();
            events
                .expect_publish()
                .returning(|_| Box::pin(async { Ok(()) }));
            Self {
                orders: MockOrderRepository::new(),
                holds: MockEscrowHoldRepository::new(),
                settlements: MockSettlementRepository::new(),
                disputes: MockDisputeRepository::new(),
                profiles: MockPayoutProfileRepository::new(),
                gateway: MockEscrowGateway::new(),
                events,
            }
        }

        fn build(self) -> OrderLifecycleUseCase {
            OrderLifecycleUseCase::new(
                Arc::new(self.orders),
                Arc::new(self.holds),
                Arc::new(self.settlements),
                Arc::new(self.disputes),
                Arc::new(self.profiles),
                Arc::new(self.gateway),
                Arc::new(self.events),
                FeePolicy {
                    version: "2025-01".to_string(),
                    fee_bps: 1_500,
                },
                LifecyclePolicy {
                    review_days: 3,
                    dispute_window_days: 14,
                    dispute_escalate_days: 3,
                },
            )
        }
    }

    fn sample_order(status: OrderStatus) -> OrderEntity {
        let now = Utc::now();
        let delivered = matches!(
            status,
            OrderStatus::Delivered | OrderStatus::Revision | OrderStatus::Disputed
        );
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
            delivered_at: delivered.then_some(now - Duration::days(1)),
            review_deadline: delivered.then_some(now + Duration::days(2)),
            disputable_until: delivered.then_some(now + Duration::days(13)),
            revision_count: 0,
            max_revisions: 2,
            provider_payment_ref: Some("hold_abc".to_string()),
            cancelled_by: None,
            cancel_reason: None,
            version: 0,
            created_at: now - Duration::days(2),
            updated_at: now - Duration::days(1),
        }
    }

    fn sample_hold(order_id: Uuid, state: EscrowState, captured: i64, refunded: i64) -> EscrowHoldEntity {
        let now = Utc::now();
        EscrowHoldEntity {
            id: Uuid::new_v4(),
            order_id,
            provider_ref: "hold_abc".to_string(),
            amount_minor: 4_900,
            captured_minor: captured,
            refunded_minor: refunded,
            state: state.to_string(),
            attempt_generation: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn expect_order(orders: &mut MockOrderRepository, order: OrderEntity) {
        orders
            .expect_find_by_id()
            .with(eq(order.id))
            .returning(move |_| {
                let order = order.clone();
                Box::pin(async move { Ok(Some(order)) })
            });
    }

    #[tokio::test]
    async fn payment_authorized_accepts_a_pending_order() {
        let mut fixture = Fixture::new();
        let order = sample_order(OrderStatus::PendingPayment);
        let order_id = order.id;
        expect_order(&mut fixture.orders, order);

        fixture
            .orders
            .expect_transition_status()
            .withf(|write| {
                write.from == OrderStatus::PendingPayment
                    && write.to == OrderStatus::Accepted
                    && write.expected_version == 0
            })
            .returning(|_| Box::pin(async { Ok(TransitionOutcome::Applied) }));

        let usecase = fixture.build();
        usecase
            .mark_payment_authorized(order_id, "hold_abc", 4_900)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn payment_authorized_replay_is_a_noop_once_accepted() {
        let mut fixture = Fixture::new();
        let order = sample_order(OrderStatus::Accepted);
        let order_id = order.id;
        expect_order(&mut fixture.orders, order);

        let usecase = fixture.build();
        usecase
            .mark_payment_authorized(order_id, "hold_abc", 4_900)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn payment_failed_voids_the_hold_and_cancels() {
        let mut fixture = Fixture::new();
        let order = sample_order(OrderStatus::PendingPayment);
        let order_id = order.id;
        expect_order(&mut fixture.orders, order);

        fixture
            .holds
            .expect_mark_voided()
            .with(eq(order_id))
            .returning(|_| Box::pin(async { Ok(()) }));
        fixture
            .orders
            .expect_transition_status()
            .withf(|write| {
                write.to == OrderStatus::Cancelled
                    && matches!(
                        &write.stamp,
                        TransitionStamp::Cancelled { cancelled_by, .. } if cancelled_by == "system"
                    )
            })
            .returning(|_| Box::pin(async { Ok(TransitionOutcome::Applied) }));

        let usecase = fixture.build();
        usecase
            .mark_payment_failed(order_id, "card_declined")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn start_work_rejects_a_different_seller() {
        let mut fixture = Fixture::new();
        let order = sample_order(OrderStatus::Accepted);
        let order_id = order.id;
        expect_order(&mut fixture.orders, order);

        let usecase = fixture.build();
        let err = usecase.start_work(order_id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, OrderFlowError::NotAllowed("seller")));
    }

    #[tokio::test]
    async fn deliver_stamps_review_and_dispute_windows() {
        let mut fixture = Fixture::new();
        let order = sample_order(OrderStatus::InProgress);
        let order_id = order.id;
        let seller_id = order.seller_id;
        expect_order(&mut fixture.orders, order);

        fixture
            .orders
            .expect_transition_status()
            .withf(|write| {
                write.from == OrderStatus::InProgress
                    && write.to == OrderStatus::Delivered
                    && matches!(
                        &write.stamp,
                        TransitionStamp::Delivered {
                            review_deadline,
                            disputable_until,
                            ..
                        } if disputable_until > review_deadline
                    )
            })
            .returning(|_| Box::pin(async { Ok(TransitionOutcome::Applied) }));

        let usecase = fixture.build();
        usecase.deliver(order_id, seller_id).await.unwrap();
    }

    #[tokio::test]
    async fn retried_deliver_does_not_restamp_the_review_window() {
        let mut fixture = Fixture::new();
        let order = sample_order(OrderStatus::Delivered);
        let order_id = order.id;
        let seller_id = order.seller_id;
        expect_order(&mut fixture.orders, order);

        // no transition_status expectation: the retry must not write
        let usecase = fixture.build();
        usecase.deliver(order_id, seller_id).await.unwrap();
    }

    #[tokio::test]
    async fn retried_revision_request_does_not_spend_a_second_slot() {
        let mut fixture = Fixture::new();
        let mut order = sample_order(OrderStatus::Revision);
        order.revision_count = 1;
        let order_id = order.id;
        let buyer_id = order.buyer_id;
        expect_order(&mut fixture.orders, order);

        let usecase = fixture.build();
        usecase.request_revision(order_id, buyer_id).await.unwrap();
    }

    #[tokio::test]
    async fn revision_request_is_rejected_once_slots_run_out() {
        let mut fixture = Fixture::new();
        let mut order = sample_order(OrderStatus::Delivered);
        order.revision_count = 2;
        let order_id = order.id;
        let buyer_id = order.buyer_id;
        expect_order(&mut fixture.orders, order);

        let usecase = fixture.build();
        let err = usecase.request_revision(order_id, buyer_id).await.unwrap_err();
        assert!(matches!(
            err,
            OrderFlowError::RevisionLimitExceeded { max: 2 }
        ));
    }

    #[tokio::test]
    async fn buyer_accept_captures_and_initiates_payout() {
        let mut fixture = Fixture::new();
        let order = sample_order(OrderStatus::Delivered);
        let order_id = order.id;
        let buyer_id = order.buyer_id;
        let seller_id = order.seller_id;
        expect_order(&mut fixture.orders, order.clone());

        fixture
            .disputes
            .expect_has_unresolved_for_order()
            .with(eq(order_id))
            .returning(|_| Box::pin(async { Ok(false) }));
        fixture
            .orders
            .expect_claim_transition()
            .with(eq(order_id), eq(0i64), eq("delivered".to_string()))
            .returning(|_, _, _| {
                Box::pin(async { Ok(ClaimOutcome::Claimed { version: 1 }) })
            });
        fixture
            .settlements
            .expect_upsert_for_order()
            .withf(|settlement| {
                settlement.gross_minor == 4_900
                    && settlement.fee_minor == 735
                    && settlement.seller_earnings_minor == 4_165
                    && settlement.payout_status == "pending"
            })
            .returning(|_| Box::pin(async { Ok(Uuid::new_v4()) }));
        fixture.holds.expect_find_by_order().returning(move |id| {
            let hold = sample_hold(id, EscrowState::Authorized, 0, 0);
            Box::pin(async move { Ok(Some(hold)) })
        });
        fixture
            .gateway
            .expect_capture()
            .withf(move |provider_ref, amount, key| {
                provider_ref == "hold_abc"
                    && *amount == 4_900
                    && *key == format!("{order_id}:capture:0")
            })
            .times(1)
            .returning(|_, _, _| {
                Box::pin(async {
                    Ok(ProviderCallOutcome::Succeeded(CaptureReceipt {
                        captured_minor: 4_900,
                    }))
                })
            });
        fixture
            .holds
            .expect_mark_captured()
            .with(eq(order_id), eq(4_900i64))
            .returning(|_, _| Box::pin(async { Ok(()) }));
        fixture
            .settlements
            .expect_find_by_order()
            .returning(|_| Box::pin(async { Ok(None) }));
        fixture
            .profiles
            .expect_find_active_account_ref()
            .with(eq(seller_id))
            .returning(|_| Box::pin(async { Ok(Some("acct_seller".to_string())) }));
        fixture
            .gateway
            .expect_transfer_to_seller()
            .withf(|account, amount, _| account == "acct_seller" && *amount == 4_165)
            .times(1)
            .returning(|_, _, _| {
                Box::pin(async {
                    Ok(ProviderCallOutcome::Succeeded(TransferReceipt {
                        transfer_ref: "tr_001".to_string(),
                    }))
                })
            });
        fixture
            .settlements
            .expect_record_payout_initiated()
            .with(eq(order_id), eq("tr_001".to_string()))
            .returning(|_, _| Box::pin(async { Ok(()) }));
        fixture
            .orders
            .expect_transition_status()
            .withf(|write| {
                write.from == OrderStatus::Delivered
                    && write.to == OrderStatus::Completed
                    && write.expected_version == 1
            })
            .returning(|_| Box::pin(async { Ok(TransitionOutcome::Applied) }));

        let usecase = fixture.build();
        usecase
            .complete(order_id, CompletionTrigger::BuyerAccept { buyer_id })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn completing_an_already_completed_order_is_a_noop() {
        let mut fixture = Fixture::new();
        let order = sample_order(OrderStatus::Completed);
        let order_id = order.id;
        expect_order(&mut fixture.orders, order);

        let usecase = fixture.build();
        usecase
            .complete(order_id, CompletionTrigger::AutoAccept)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn completion_is_blocked_while_a_dispute_is_unresolved() {
        let mut fixture = Fixture::new();
        let order = sample_order(OrderStatus::Delivered);
        let order_id = order.id;
        expect_order(&mut fixture.orders, order);

        fixture
            .disputes
            .expect_has_unresolved_for_order()
            .returning(|_| Box::pin(async { Ok(true) }));

        let usecase = fixture.build();
        let err = usecase
            .complete(order_id, CompletionTrigger::AutoAccept)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderFlowError::DisputePending));
    }

    #[tokio::test]
    async fn capture_decline_leaves_the_order_delivered() {
        let mut fixture = Fixture::new();
        let order = sample_order(OrderStatus::Delivered);
        let order_id = order.id;
        expect_order(&mut fixture.orders, order);

        fixture
            .disputes
            .expect_has_unresolved_for_order()
            .returning(|_| Box::pin(async { Ok(false) }));
        fixture
            .orders
            .expect_claim_transition()
            .returning(|_, _, _| {
                Box::pin(async { Ok(ClaimOutcome::Claimed { version: 1 }) })
            });
        fixture
            .settlements
            .expect_upsert_for_order()
            .returning(|_| Box::pin(async { Ok(Uuid::new_v4()) }));
        fixture.holds.expect_find_by_order().returning(move |id| {
            let hold = sample_hold(id, EscrowState::Authorized, 0, 0);
            Box::pin(async move { Ok(Some(hold)) })
        });
        fixture.gateway.expect_capture().returning(|_, _, _| {
            Box::pin(async {
                Ok(ProviderCallOutcome::DefinitivelyFailed(ProviderDecline {
                    code: DeclineCode::PaymentDeclined,
                    message: "card expired".to_string(),
                }))
            })
        });
        fixture
            .holds
            .expect_bump_attempt_generation()
            .with(eq(order_id))
            .times(1)
            .returning(|_| Box::pin(async { Ok(1) }));

        let usecase = fixture.build();
        let err = usecase
            .complete(order_id, CompletionTrigger::AutoAccept)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderFlowError::PaymentDeclined(_)));
    }

    #[tokio::test]
    async fn ambiguous_capture_reports_reconciliation_pending() {
        let mut fixture = Fixture::new();
        let order = sample_order(OrderStatus::Delivered);
        let order_id = order.id;
        expect_order(&mut fixture.orders, order);

        fixture
            .disputes
            .expect_has_unresolved_for_order()
            .returning(|_| Box::pin(async { Ok(false) }));
        fixture
            .orders
            .expect_claim_transition()
            .returning(|_, _, _| {
                Box::pin(async { Ok(ClaimOutcome::Claimed { version: 1 }) })
            });
        fixture
            .settlements
            .expect_upsert_for_order()
            .returning(|_| Box::pin(async { Ok(Uuid::new_v4()) }));
        fixture.holds.expect_find_by_order().returning(move |id| {
            let hold = sample_hold(id, EscrowState::Authorized, 0, 0);
            Box::pin(async move { Ok(Some(hold)) })
        });
        fixture.gateway.expect_capture().returning(|_, _, _| {
            Box::pin(async {
                Ok(ProviderCallOutcome::Unknown(
                    "server error: status 503".to_string(),
                ))
            })
        });

        let usecase = fixture.build();
        let err = usecase
            .complete(order_id, CompletionTrigger::AutoAccept)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderFlowError::ReconciliationPending));
    }

    #[tokio::test]
    async fn concurrent_claim_conflict_surfaces_as_such() {
        let mut fixture = Fixture::new();
        let order = sample_order(OrderStatus::Delivered);
        let order_id = order.id;
        expect_order(&mut fixture.orders, order);

        fixture
            .disputes
            .expect_has_unresolved_for_order()
            .returning(|_| Box::pin(async { Ok(false) }));
        fixture
            .orders
            .expect_claim_transition()
            .returning(|_, _, _| Box::pin(async { Ok(ClaimOutcome::Conflict) }));

        let usecase = fixture.build();
        let err = usecase
            .complete(order_id, CompletionTrigger::AutoAccept)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderFlowError::ConcurrentModification));
    }

    #[tokio::test]
    async fn buyer_cancel_before_work_voids_the_hold() {
        let mut fixture = Fixture::new();
        let order = sample_order(OrderStatus::Accepted);
        let order_id = order.id;
        let buyer_id = order.buyer_id;
        expect_order(&mut fixture.orders, order);

        fixture
            .orders
            .expect_claim_transition()
            .with(eq(order_id), eq(0i64), eq("accepted".to_string()))
            .returning(|_, _, _| {
                Box::pin(async { Ok(ClaimOutcome::Claimed { version: 1 }) })
            });
        fixture.holds.expect_find_by_order().returning(move |id| {
            let hold = sample_hold(id, EscrowState::Authorized, 0, 0);
            Box::pin(async move { Ok(Some(hold)) })
        });
        fixture
            .gateway
            .expect_void()
            .withf(move |provider_ref, key| {
                provider_ref == "hold_abc" && *key == format!("{order_id}:void:0")
            })
            .times(1)
            .returning(|_, _| {
                Box::pin(async {
                    Ok(ProviderCallOutcome::Succeeded(VoidReceipt {
                        provider_ref: "hold_abc".to_string(),
                    }))
                })
            });
        fixture
            .holds
            .expect_mark_voided()
            .with(eq(order_id))
            .returning(|_| Box::pin(async { Ok(()) }));
        fixture
            .orders
            .expect_transition_status()
            .withf(|write| {
                write.to == OrderStatus::Cancelled
                    && matches!(
                        &write.stamp,
                        TransitionStamp::Cancelled { cancelled_by, .. } if cancelled_by == "buyer"
                    )
            })
            .returning(|_| Box::pin(async { Ok(TransitionOutcome::Applied) }));

        let usecase = fixture.build();
        usecase
            .cancel(order_id, ActorRole::Buyer, buyer_id, Some("changed my mind".to_string()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn buyer_cannot_cancel_once_work_started() {
        let mut fixture = Fixture::new();
        let order = sample_order(OrderStatus::InProgress);
        let order_id = order.id;
        let buyer_id = order.buyer_id;
        expect_order(&mut fixture.orders, order);

        let usecase = fixture.build();
        let err = usecase
            .cancel(order_id, ActorRole::Buyer, buyer_id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderFlowError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn partial_refund_settlement_splits_the_retained_amount() {
        let mut fixture = Fixture::new();
        let mut order = sample_order(OrderStatus::Disputed);
        order.total_amount_minor = 10_000;
        let order_id = order.id;
        let seller_id = order.seller_id;
        expect_order(&mut fixture.orders, order);

        fixture
            .orders
            .expect_claim_transition()
            .with(eq(order_id), eq(0i64), eq("disputed".to_string()))
            .returning(|_, _, _| {
                Box::pin(async { Ok(ClaimOutcome::Claimed { version: 1 }) })
            });
        fixture.holds.expect_find_by_order().returning(move |id| {
            let mut hold = sample_hold(id, EscrowState::Captured, 10_000, 0);
            hold.amount_minor = 10_000;
            Box::pin(async move { Ok(Some(hold)) })
        });
        fixture
            .settlements
            .expect_upsert_for_order()
            .withf(|settlement| {
                settlement.gross_minor == 7_000
                    && settlement.fee_minor == 1_050
                    && settlement.seller_earnings_minor == 5_950
            })
            .returning(|_| Box::pin(async { Ok(Uuid::new_v4()) }));
        fixture
            .gateway
            .expect_refund()
            .withf(move |provider_ref, amount, key| {
                provider_ref == "hold_abc"
                    && *amount == 3_000
                    && *key == format!("{order_id}:refund:0")
            })
            .times(1)
            .returning(|_, _, _| {
                Box::pin(async {
                    Ok(ProviderCallOutcome::Succeeded(RefundReceipt {
                        refunded_total_minor: 3_000,
                    }))
                })
            });
        fixture
            .holds
            .expect_record_refund_total()
            .with(eq(order_id), eq(3_000i64))
            .returning(|_, _| Box::pin(async { Ok(()) }));
        fixture
            .settlements
            .expect_find_by_order()
            .returning(|_| Box::pin(async { Ok(None) }));
        fixture
            .profiles
            .expect_find_active_account_ref()
            .with(eq(seller_id))
            .returning(|_| Box::pin(async { Ok(Some("acct_seller".to_string())) }));
        fixture
            .gateway
            .expect_transfer_to_seller()
            .withf(|_, amount, _| *amount == 5_950)
            .returning(|_, _, _| {
                Box::pin(async {
                    Ok(ProviderCallOutcome::Succeeded(TransferReceipt {
                        transfer_ref: "tr_002".to_string(),
                    }))
                })
            });
        fixture
            .settlements
            .expect_record_payout_initiated()
            .returning(|_, _| Box::pin(async { Ok(()) }));
        fixture
            .orders
            .expect_transition_status()
            .withf(|write| {
                write.from == OrderStatus::Disputed && write.to == OrderStatus::Completed
            })
            .returning(|_| Box::pin(async { Ok(TransitionOutcome::Applied) }));

        let usecase = fixture.build();
        let settlement = usecase.settle_with_refund(order_id, 30).await.unwrap();

        assert_eq!(settlement.refund_minor, 3_000);
        assert_eq!(settlement.retained_minor, 7_000);
        assert_eq!(settlement.order_status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn full_refund_on_an_uncaptured_hold_voids_and_cancels() {
        let mut fixture = Fixture::new();
        let order = sample_order(OrderStatus::Disputed);
        let order_id = order.id;
        expect_order(&mut fixture.orders, order);

        fixture
            .orders
            .expect_claim_transition()
            .returning(|_, _, _| {
                Box::pin(async { Ok(ClaimOutcome::Claimed { version: 1 }) })
            });
        fixture.holds.expect_find_by_order().returning(move |id| {
            let hold = sample_hold(id, EscrowState::Authorized, 0, 0);
            Box::pin(async move { Ok(Some(hold)) })
        });
        fixture.gateway.expect_void().times(1).returning(|_, _| {
            Box::pin(async {
                Ok(ProviderCallOutcome::Succeeded(VoidReceipt {
                    provider_ref: "hold_abc".to_string(),
                }))
            })
        });
        fixture
            .holds
            .expect_mark_voided()
            .returning(|_| Box::pin(async { Ok(()) }));
        fixture
            .orders
            .expect_transition_status()
            .withf(|write| {
                write.from == OrderStatus::Disputed
                    && write.to == OrderStatus::Cancelled
                    && matches!(
                        &write.stamp,
                        TransitionStamp::Cancelled { cancelled_by, .. } if cancelled_by == "operator"
                    )
            })
            .returning(|_| Box::pin(async { Ok(TransitionOutcome::Applied) }));

        let usecase = fixture.build();
        let settlement = usecase.settle_with_refund(order_id, 100).await.unwrap();

        assert_eq!(settlement.refund_minor, 4_900);
        assert_eq!(settlement.retained_minor, 0);
        assert_eq!(settlement.order_status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn payout_completed_releases_the_hold() {
        let mut fixture = Fixture::new();
        let order = sample_order(OrderStatus::Completed);
        let order_id = order.id;
        expect_order(&mut fixture.orders, order);

        fixture
            .settlements
            .expect_mark_payout_completed()
            .with(eq(order_id), eq("tr_001".to_string()))
            .returning(|_, _| Box::pin(async { Ok(()) }));
        fixture
            .holds
            .expect_mark_released()
            .with(eq(order_id))
            .returning(|_| Box::pin(async { Ok(()) }));

        let usecase = fixture.build();
        usecase
            .reconcile_payout_completed(order_id, "tr_001".to_string())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn captured_event_redrives_a_stalled_completion() {
        let mut fixture = Fixture::new();
        let order = sample_order(OrderStatus::Delivered);
        let order_id = order.id;
        let seller_id = order.seller_id;
        expect_order(&mut fixture.orders, order);

        fixture
            .holds
            .expect_mark_captured()
            .with(eq(order_id), eq(4_900i64))
            .returning(|_, _| Box::pin(async { Ok(()) }));
        fixture
            .disputes
            .expect_has_unresolved_for_order()
            .returning(|_| Box::pin(async { Ok(false) }));
        fixture
            .orders
            .expect_claim_transition()
            .returning(|_, _, _| {
                Box::pin(async { Ok(ClaimOutcome::Claimed { version: 1 }) })
            });
        fixture
            .settlements
            .expect_upsert_for_order()
            .returning(|_| Box::pin(async { Ok(Uuid::new_v4()) }));
        // capture already landed, so the gateway must not be asked again
        fixture.holds.expect_find_by_order().returning(move |id| {
            let hold = sample_hold(id, EscrowState::Captured, 4_900, 0);
            Box::pin(async move { Ok(Some(hold)) })
        });
        fixture
            .settlements
            .expect_find_by_order()
            .returning(|_| Box::pin(async { Ok(None) }));
        fixture
            .profiles
            .expect_find_active_account_ref()
            .with(eq(seller_id))
            .returning(|_| Box::pin(async { Ok(Some("acct_seller".to_string())) }));
        fixture
            .gateway
            .expect_transfer_to_seller()
            .returning(|_, _, _| {
                Box::pin(async {
                    Ok(ProviderCallOutcome::Succeeded(TransferReceipt {
                        transfer_ref: "tr_003".to_string(),
                    }))
                })
            });
        fixture
            .settlements
            .expect_record_payout_initiated()
            .returning(|_, _| Box::pin(async { Ok(()) }));
        fixture
            .orders
            .expect_transition_status()
            .withf(|write| write.to == OrderStatus::Completed)
            .returning(|_| Box::pin(async { Ok(TransitionOutcome::Applied) }));

        let usecase = fixture.build();
        usecase.reconcile_captured(order_id, 4_900).await.unwrap();
    }

    #[tokio::test]
    async fn missing_payout_profile_marks_the_payout_failed_but_completes() {
        let mut fixture = Fixture::new();
        let order = sample_order(OrderStatus::Delivered);
        let order_id = order.id;
        let buyer_id = order.buyer_id;
        expect_order(&mut fixture.orders, order);

        fixture
            .disputes
            .expect_has_unresolved_for_order()
            .returning(|_| Box::pin(async { Ok(false) }));
        fixture
            .orders
            .expect_claim_transition()
            .returning(|_, _, _| {
                Box::pin(async { Ok(ClaimOutcome::Claimed { version: 1 }) })
            });
        fixture
            .settlements
            .expect_upsert_for_order()
            .returning(|_| Box::pin(async { Ok(Uuid::new_v4()) }));
        fixture.holds.expect_find_by_order().returning(move |id| {
            let hold = sample_hold(id, EscrowState::Captured, 4_900, 0);
            Box::pin(async move { Ok(Some(hold)) })
        });
        fixture
            .settlements
            .expect_find_by_order()
            .returning(|_| Box::pin(async { Ok(None) }));
        fixture
            .profiles
            .expect_find_active_account_ref()
            .returning(|_| Box::pin(async { Ok(None) }));
        fixture
            .settlements
            .expect_mark_payout_failed()
            .withf(|_, reason| reason.contains("payout profile"))
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(()) }));
        fixture
            .orders
            .expect_transition_status()
            .withf(|write| write.to == OrderStatus::Completed)
            .returning(|_| Box::pin(async { Ok(TransitionOutcome::Applied) }));

        let usecase = fixture.build();
        usecase
            .complete(order_id, CompletionTrigger::BuyerAccept { buyer_id })
            .await
            .unwrap();
    }
}
