pub mod error;
pub mod executor;
pub mod feedback;
pub mod importer;
pub mod matcher;
pub mod records;
pub mod session;
