use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::entities::disputes::DisputeEntity;
use crate::entities::escrow_holds::EscrowHoldEntity;
use crate::entities::order_line_items::OrderLineItemEntity;
use crate::entities::orders::OrderEntity;
use crate::entities::settlements::SettlementEntity;
use crate::value_objects::enums::order_statuses::OrderStatus;

/// Extra columns written together with a status change, so the change and its
/// stamps land in one atomic update.
#[derive(Debug, Clone)]
pub enum TransitionStamp {
    None,
    Delivered {
        delivered_at: DateTime<Utc>,
        review_deadline: DateTime<Utc>,
        disputable_until: DateTime<Utc>,
    },
    RevisionRequested,
    Cancelled {
        cancelled_by: String,
        cancel_reason: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct StatusWrite {
    pub order_id: Uuid,
    pub expected_version: i64,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub stamp: TransitionStamp,
}

/// Result of a compare-and-set against the order row. `Conflict` means the
/// row moved underneath us (version or status no longer match) and the caller
/// must re-read before deciding anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied,
    Conflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed { version: i64 },
    Conflict,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderDto {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub gig_id: Uuid,
    pub package_id: Option<Uuid>,
    pub currency: String,
    pub total_amount_minor: i64,
    pub status: String,
    pub delivery_days: i32,
    pub delivery_deadline: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub review_deadline: Option<DateTime<Utc>>,
    pub disputable_until: Option<DateTime<Utc>>,
    pub revision_count: i32,
    pub max_revisions: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderEntity> for OrderDto {
    fn from(entity: OrderEntity) -> Self {
        Self {
            id: entity.id,
            buyer_id: entity.buyer_id,
            seller_id: entity.seller_id,
            gig_id: entity.gig_id,
            package_id: entity.package_id,
            currency: entity.currency,
            total_amount_minor: entity.total_amount_minor,
            status: entity.status,
            delivery_days: entity.delivery_days,
            delivery_deadline: entity.delivery_deadline,
            delivered_at: entity.delivered_at,
            review_deadline: entity.review_deadline,
            disputable_until: entity.disputable_until,
            revision_count: entity.revision_count,
            max_revisions: entity.max_revisions,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LineItemDto {
    pub label: String,
    pub amount_minor: i64,
}

impl From<OrderLineItemEntity> for LineItemDto {
    fn from(entity: OrderLineItemEntity) -> Self {
        Self {
            label: entity.label,
            amount_minor: entity.amount_minor,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EscrowDto {
    pub state: String,
    pub amount_minor: i64,
    pub captured_minor: i64,
    pub refunded_minor: i64,
}

impl From<EscrowHoldEntity> for EscrowDto {
    fn from(entity: EscrowHoldEntity) -> Self {
        Self {
            state: entity.state,
            amount_minor: entity.amount_minor,
            captured_minor: entity.captured_minor,
            refunded_minor: entity.refunded_minor,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SettlementDto {
    pub gross_minor: i64,
    pub fee_minor: i64,
    pub seller_earnings_minor: i64,
    pub fee_bps: i32,
    pub fee_policy_version: String,
    pub payout_status: String,
}

impl From<SettlementEntity> for SettlementDto {
    fn from(entity: SettlementEntity) -> Self {
        Self {
            gross_minor: entity.gross_minor,
            fee_minor: entity.fee_minor,
            seller_earnings_minor: entity.seller_earnings_minor,
            fee_bps: entity.fee_bps,
            fee_policy_version: entity.fee_policy_version,
            payout_status: entity.payout_status,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DisputeSummaryDto {
    pub id: Uuid,
    pub status: String,
    pub resolution: String,
    pub opened_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl From<DisputeEntity> for DisputeSummaryDto {
    fn from(entity: DisputeEntity) -> Self {
        Self {
            id: entity.id,
            status: entity.status,
            resolution: entity.resolution,
            opened_at: entity.opened_at,
            resolved_at: entity.resolved_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderDetailsDto {
    pub order: OrderDto,
    pub line_items: Vec<LineItemDto>,
    pub escrow: Option<EscrowDto>,
    pub settlement: Option<SettlementDto>,
    pub dispute: Option<DisputeSummaryDto>,
}
