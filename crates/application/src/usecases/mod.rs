pub mod checkout;
pub mod disputes;
pub mod order_lifecycle;
pub mod webhook_reconciler;
