use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::entities::escrow_holds::EscrowHoldEntity;

/// Local mirror of the provider-side hold. Every write is guarded so replays
/// (webhook redelivery, resumed transitions) cannot move the hold backwards
/// or double-count money.
#[async_trait]
#[automock]
pub trait EscrowHoldRepository {
    async fn find_by_order(&self, order_id: Uuid) -> Result<Option<EscrowHoldEntity>>;

    /// authorized -> captured, recording the captured amount. A no-op when
    /// the hold already reached captured (or later) state.
    async fn mark_captured(&self, order_id: Uuid, captured_minor: i64) -> Result<()>;

    /// Folds the provider's cumulative refunded total into the hold; the
    /// stored value only ever grows. Marks the hold refunded when the whole
    /// captured amount came back.
    async fn record_refund_total(&self, order_id: Uuid, refunded_total_minor: i64) -> Result<()>;

    /// captured -> released_to_seller, once the payout is confirmed.
    async fn mark_released(&self, order_id: Uuid) -> Result<()>;

    /// authorized -> voided. Used for cancellations before capture and for
    /// full-refund resolutions of never-captured holds.
    async fn mark_voided(&self, order_id: Uuid) -> Result<()>;

    /// Bumped after a definitive provider failure so the next attempt uses
    /// fresh idempotency keys. Returns the new generation.
    async fn bump_attempt_generation(&self, order_id: Uuid) -> Result<i32>;
}
