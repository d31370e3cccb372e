use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct LineItemInput {
    pub label: String,
    pub amount_minor: i64,
}

/// Checkout request as received over HTTP. `total_amount_minor` is the total
/// the client displayed to the buyer; it must equal the sum of the line items
/// or the checkout is rejected.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderRequest {
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub gig_id: Uuid,
    pub package_id: Option<Uuid>,
    pub currency: String,
    pub line_items: Vec<LineItemInput>,
    pub total_amount_minor: i64,
    pub delivery_days: i32,
    pub max_revisions: i32,
    pub payment_method_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutReceipt {
    pub order_id: Uuid,
    pub status: String,
    pub total_amount_minor: i64,
    pub fee_quote_minor: i64,
    pub seller_earnings_quote_minor: i64,
    pub provider_ref: String,
}
