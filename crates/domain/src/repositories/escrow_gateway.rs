use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::value_objects::gateway::{
    AuthorizationReceipt, AuthorizeRequest, CaptureReceipt, ProviderCallOutcome, RefundReceipt,
    TransferReceipt, VoidReceipt,
};
use crate::value_objects::provider_events::ProviderEvent;

/// Port to the external payment provider. Every money-moving call takes an
/// idempotency key and reports a [`ProviderCallOutcome`]; only webhook
/// verification is allowed to fail with a plain error (a bad signature is
/// never ambiguous).
#[async_trait]
#[automock]
pub trait EscrowGateway {
    /// Places a hold on the buyer's payment method for the full order
    /// amount. No funds move until capture.
    async fn authorize(
        &self,
        request: AuthorizeRequest,
    ) -> Result<ProviderCallOutcome<AuthorizationReceipt>>;

    /// Captures part or all of the held amount. At most one capture per hold.
    async fn capture(
        &self,
        provider_ref: String,
        amount_minor: i64,
        idempotency_key: String,
    ) -> Result<ProviderCallOutcome<CaptureReceipt>>;

    /// Refunds out of the captured amount back to the buyer.
    async fn refund(
        &self,
        provider_ref: String,
        amount_minor: i64,
        idempotency_key: String,
    ) -> Result<ProviderCallOutcome<RefundReceipt>>;

    /// Releases an uncaptured hold back to the buyer's payment method.
    async fn void(
        &self,
        provider_ref: String,
        idempotency_key: String,
    ) -> Result<ProviderCallOutcome<VoidReceipt>>;

    /// Moves seller earnings to their payout account at the provider.
    async fn transfer_to_seller(
        &self,
        seller_account_ref: String,
        amount_minor: i64,
        idempotency_key: String,
    ) -> Result<ProviderCallOutcome<TransferReceipt>>;

    /// Verifies the webhook signature header against the shared secret and
    /// parses the payload into a typed event.
    fn verify_webhook_signature(&self, payload: &[u8], signature_header: &str)
    -> Result<ProviderEvent>;
}
