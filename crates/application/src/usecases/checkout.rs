use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use domain::entities::escrow_holds::InsertEscrowHoldEntity;
use domain::entities::order_line_items::InsertOrderLineItemEntity;
use domain::entities::orders::InsertOrderEntity;
use domain::fees::compute_split;
use domain::repositories::escrow_gateway::EscrowGateway;
use domain::repositories::orders::OrderRepository;
use domain::value_objects::checkout::{CheckoutReceipt, PlaceOrderRequest};
use domain::value_objects::enums::escrow_states::EscrowState;
use domain::value_objects::enums::order_statuses::OrderStatus;
use domain::value_objects::gateway::{idempotency_key, AuthorizeRequest, ProviderCallOutcome};
use domain::value_objects::policy::FeePolicy;

use crate::error::{FlowResult, OrderFlowError};

/// Places an order: validates the cart, authorizes an escrow hold for the
/// full amount, and persists order + line items + hold in one transaction.
/// The order id is generated up front so the authorization carries a
/// deterministic idempotency key before anything is stored.
pub struct CheckoutUseCase {
    orders: Arc<dyn OrderRepository + Send + Sync>,
    gateway: Arc<dyn EscrowGateway + Send + Sync>,
    fee_policy: FeePolicy,
}

impl CheckoutUseCase {
    pub fn new(
        orders: Arc<dyn OrderRepository + Send + Sync>,
        gateway: Arc<dyn EscrowGateway + Send + Sync>,
        fee_policy: FeePolicy,
    ) -> Self {
        Self {
            orders,
            gateway,
            fee_policy,
        }
    }

    pub async fn place_order(&self, request: PlaceOrderRequest) -> FlowResult<CheckoutReceipt> {
        Self::validate(&request)?;

        let quote = compute_split(request.total_amount_minor, self.fee_policy.fee_bps)
            .map_err(|err| OrderFlowError::Validation(err.to_string()))?;

        let order_id = Uuid::new_v4();
        let authorize = AuthorizeRequest {
            order_id,
            amount_minor: request.total_amount_minor,
            currency: request.currency.clone(),
            payment_method_token: request.payment_method_token.clone(),
            idempotency_key: idempotency_key(order_id, "authorize", 0),
        };

        let receipt = match self.gateway.authorize(authorize).await? {
            ProviderCallOutcome::Succeeded(receipt) => receipt,
            ProviderCallOutcome::DefinitivelyFailed(decline) => {
                info!(
                    %order_id,
                    buyer_id = %request.buyer_id,
                    decline_code = ?decline.code,
                    "checkout: authorization declined"
                );
                return Err(decline.into());
            }
            ProviderCallOutcome::Unknown(context) => {
                // Nothing was persisted; the buyer can simply retry the
                // checkout, which will use a fresh order id and key.
                warn!(
                    %order_id,
                    buyer_id = %request.buyer_id,
                    context = %context,
                    "checkout: authorization outcome unknown, failing checkout without creating an order"
                );
                return Err(OrderFlowError::ProviderUnavailable(context));
            }
        };

        let now = Utc::now();
        let order = InsertOrderEntity {
            id: order_id,
            buyer_id: request.buyer_id,
            seller_id: request.seller_id,
            gig_id: request.gig_id,
            package_id: request.package_id,
            currency: request.currency.clone(),
            total_amount_minor: request.total_amount_minor,
            status: OrderStatus::PendingPayment.to_string(),
            delivery_days: request.delivery_days,
            delivery_deadline: now + Duration::days(i64::from(request.delivery_days)),
            revision_count: 0,
            max_revisions: request.max_revisions,
            provider_payment_ref: Some(receipt.provider_ref.clone()),
            version: 0,
        };

        let line_items = request
            .line_items
            .iter()
            .map(|item| InsertOrderLineItemEntity {
                order_id,
                label: item.label.clone(),
                amount_minor: item.amount_minor,
            })
            .collect();

        let hold = InsertEscrowHoldEntity {
            order_id,
            provider_ref: receipt.provider_ref.clone(),
            amount_minor: request.total_amount_minor,
            captured_minor: 0,
            refunded_minor: 0,
            state: EscrowState::Authorized.to_string(),
            attempt_generation: 0,
        };

        self.orders
            .create_order_with_hold(order, line_items, hold)
            .await?;

        info!(
            %order_id,
            buyer_id = %request.buyer_id,
            seller_id = %request.seller_id,
            total_amount_minor = request.total_amount_minor,
            "checkout: order placed with escrow hold"
        );

        Ok(CheckoutReceipt {
            order_id,
            status: OrderStatus::PendingPayment.to_string(),
            total_amount_minor: request.total_amount_minor,
            fee_quote_minor: quote.fee_minor,
            seller_earnings_quote_minor: quote.seller_earnings_minor,
            provider_ref: receipt.provider_ref,
        })
    }

    fn validate(request: &PlaceOrderRequest) -> FlowResult<()> {
        if request.line_items.is_empty() {
            return Err(OrderFlowError::Validation(
                "order must contain at least one line item".to_string(),
            ));
        }
        if request
            .line_items
            .iter()
            .any(|item| item.amount_minor < 0 || item.label.trim().is_empty())
        {
            return Err(OrderFlowError::Validation(
                "line items must have a label and a non-negative amount".to_string(),
            ));
        }

        let item_sum: i64 = request.line_items.iter().map(|item| item.amount_minor).sum();
        if item_sum != request.total_amount_minor {
            return Err(OrderFlowError::Validation(format!(
                "total {} does not match line item sum {}",
                request.total_amount_minor, item_sum
            )));
        }
        if request.total_amount_minor <= 0 {
            return Err(OrderFlowError::Validation(
                "order total must be positive".to_string(),
            ));
        }
        if request.currency.trim().is_empty() {
            return Err(OrderFlowError::Validation(
                "currency is required".to_string(),
            ));
        }
        if request.delivery_days < 1 {
            return Err(OrderFlowError::Validation(
                "delivery days must be at least 1".to_string(),
            ));
        }
        if request.max_revisions < 0 {
            return Err(OrderFlowError::Validation(
                "max revisions must not be negative".to_string(),
            ));
        }
        if request.buyer_id == request.seller_id {
            return Err(OrderFlowError::Validation(
                "buyer and seller must be different parties".to_string(),
            ));
        }

        Ok(())
    }
}
