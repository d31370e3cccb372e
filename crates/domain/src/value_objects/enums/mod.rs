pub mod actor_roles;
pub mod dispute_reasons;
pub mod dispute_resolutions;
pub mod dispute_statuses;
pub mod escrow_states;
pub mod order_statuses;
pub mod payout_statuses;
