use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::entities::disputes::{DisputeEntity, InsertDisputeEntity};
use crate::value_objects::disputes::{DisputeOpenOutcome, ResolveWriteOutcome};

#[async_trait]
#[automock]
pub trait DisputeRepository {
    /// Inserts a dispute unless the order already has an unresolved one; the
    /// uniqueness is enforced at the storage layer so two concurrent opens
    /// cannot both land.
    async fn open(&self, dispute: InsertDisputeEntity) -> Result<DisputeOpenOutcome>;

    async fn find_by_id(&self, dispute_id: Uuid) -> Result<Option<DisputeEntity>>;

    async fn find_by_order(&self, order_id: Uuid) -> Result<Option<DisputeEntity>>;

    async fn has_unresolved_for_order(&self, order_id: Uuid) -> Result<bool>;

    /// Single-shot resolution write, guarded on the dispute still being
    /// unresolved. The refund percent is stored even for non-refund outcomes
    /// (100 for full_refund, 0 for revision/no_action) so a stalled
    /// settlement can be reconstructed from the row alone.
    async fn resolve(
        &self,
        dispute_id: Uuid,
        resolution: String,
        refund_percent: i32,
        admin_notes: Option<String>,
        resolved_at: DateTime<Utc>,
    ) -> Result<ResolveWriteOutcome>;

    /// Disputes still `open` whose opened_at is older than the cutoff.
    async fn list_open_before(
        &self,
        opened_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<DisputeEntity>>;

    /// open -> mediation. A no-op when the dispute already left `open`.
    async fn mark_mediation(&self, dispute_id: Uuid) -> Result<()>;
}
