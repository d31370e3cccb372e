use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::entities::escrow_holds::InsertEscrowHoldEntity;
use crate::entities::order_line_items::{InsertOrderLineItemEntity, OrderLineItemEntity};
use crate::entities::orders::{InsertOrderEntity, OrderEntity};
use crate::value_objects::orders::{ClaimOutcome, StatusWrite, TransitionOutcome};

#[async_trait]
#[automock]
pub trait OrderRepository {
    /// Persists the order, its line items and the authorized escrow hold in
    /// one transaction. Either everything lands or nothing does.
    async fn create_order_with_hold(
        &self,
        order: InsertOrderEntity,
        line_items: Vec<InsertOrderLineItemEntity>,
        hold: InsertEscrowHoldEntity,
    ) -> Result<Uuid>;

    async fn find_by_id(&self, order_id: Uuid) -> Result<Option<OrderEntity>>;

    async fn find_by_provider_ref(&self, provider_ref: String) -> Result<Option<OrderEntity>>;

    async fn list_line_items(&self, order_id: Uuid) -> Result<Vec<OrderLineItemEntity>>;

    /// Bumps the order version without changing status. Claiming before a
    /// sequence of gateway calls serializes money movement per order: a
    /// concurrent transition attempt loses the compare-and-set instead of
    /// racing the provider.
    async fn claim_transition(
        &self,
        order_id: Uuid,
        expected_version: i64,
        expected_status: String,
    ) -> Result<ClaimOutcome>;

    /// Compare-and-set status write. Applies only when id, version and the
    /// from-status all still match.
    async fn transition_status(&self, write: StatusWrite) -> Result<TransitionOutcome>;

    /// Delivered orders whose review deadline has passed, oldest first.
    /// Orders with an unresolved dispute are excluded; their clock is frozen.
    async fn list_due_for_auto_accept(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<OrderEntity>>;
}
