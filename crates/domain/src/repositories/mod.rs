pub mod disputes;
pub mod escrow_gateway;
pub mod escrow_holds;
pub mod events;
pub mod orders;
pub mod payout_profiles;
pub mod settlements;
pub mod webhook_events;
