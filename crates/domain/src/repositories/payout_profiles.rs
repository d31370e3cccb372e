use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

#[async_trait]
#[automock]
pub trait PayoutProfileRepository {
    /// Provider account ref for a seller with an active payout profile.
    /// `None` means the seller has not finished onboarding and no transfer
    /// can be initiated for them.
    async fn find_active_account_ref(&self, seller_id: Uuid) -> Result<Option<String>>;
}
