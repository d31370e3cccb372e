pub mod disputes;
pub mod escrow_holds;
pub mod order_line_items;
pub mod orders;
pub mod payout_profiles;
pub mod settlements;
pub mod webhook_events;
