pub mod checkout;
pub mod disputes;
pub mod orders;
pub mod payment_webhook;
