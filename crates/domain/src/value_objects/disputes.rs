use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::disputes::DisputeEntity;

#[derive(Debug, Clone, Deserialize)]
pub struct OpenDisputeRequest {
    pub order_id: Uuid,
    pub buyer_id: Uuid,
    pub reason_code: String,
    pub description: String,
    #[serde(default)]
    pub evidence_refs: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolveDisputeRequest {
    pub resolver_id: Uuid,
    pub decision: String,
    pub refund_percent: Option<i64>,
    pub admin_notes: Option<String>,
}

/// What a resolution did to the money, echoed back to the resolver.
#[derive(Debug, Clone, Serialize)]
pub struct DisputeSettlementSummary {
    pub dispute_id: Uuid,
    pub order_id: Uuid,
    pub resolution: String,
    pub refund_minor: i64,
    pub retained_minor: i64,
    pub order_status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisputeOpenOutcome {
    Created(Uuid),
    AlreadyOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveWriteOutcome {
    Applied,
    AlreadyResolved,
}

#[derive(Debug, Clone, Serialize)]
pub struct DisputeDto {
    pub id: Uuid,
    pub order_id: Uuid,
    pub opened_by: Uuid,
    pub reason_code: String,
    pub description: String,
    pub evidence_refs: Vec<String>,
    pub status: String,
    pub resolution: String,
    pub refund_percent: Option<i32>,
    pub admin_notes: Option<String>,
    pub opened_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl From<DisputeEntity> for DisputeDto {
    fn from(entity: DisputeEntity) -> Self {
        let evidence_refs = entity.evidence_refs_list();
        Self {
            id: entity.id,
            order_id: entity.order_id,
            opened_by: entity.opened_by,
            reason_code: entity.reason_code,
            description: entity.description,
            evidence_refs,
            status: entity.status,
            resolution: entity.resolution,
            refund_percent: entity.refund_percent,
            admin_notes: entity.admin_notes,
            opened_at: entity.opened_at,
            resolved_at: entity.resolved_at,
        }
    }
}
