pub use domain::schema::*;
