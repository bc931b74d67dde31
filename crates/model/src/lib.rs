pub mod core;
pub mod error;
pub mod events;
pub mod records;
pub mod schema;
pub mod session;
