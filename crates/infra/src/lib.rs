pub mod events;
pub mod payments;
pub mod postgres;
