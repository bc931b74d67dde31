pub mod error;
pub mod event_bus;
pub mod state;
pub mod tally;
