pub mod checkout;
pub mod disputes;
pub mod enums;
pub mod events;
pub mod gateway;
pub mod orders;
pub mod policy;
pub mod provider_events;
