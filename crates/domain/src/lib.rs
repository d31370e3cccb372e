pub mod entities;
pub mod fees;
pub mod repositories;
pub mod schema;
pub mod value_objects;
