use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::entities::settlements::{InsertSettlementEntity, SettlementEntity};

#[async_trait]
#[automock]
pub trait SettlementRepository {
    /// Inserts or recomputes the settlement for an order. Refuses to rewrite
    /// once the payout has left `pending`; at that point the split is frozen.
    async fn upsert_for_order(&self, settlement: InsertSettlementEntity) -> Result<Uuid>;

    async fn find_by_order(&self, order_id: Uuid) -> Result<Option<SettlementEntity>>;

    /// Stores the provider transfer ref once a payout has been initiated.
    async fn record_payout_initiated(&self, order_id: Uuid, transfer_ref: String) -> Result<()>;

    async fn mark_payout_completed(&self, order_id: Uuid, transfer_ref: String) -> Result<()>;

    async fn mark_payout_failed(&self, order_id: Uuid, reason: String) -> Result<()>;
}
