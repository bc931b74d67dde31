use engine_core::error::StateStoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecordStoreError {
    #[error("Record store backend error: {0}")]
    Backend(#[from] sled::Error),

    #[error("Failed to encode record {id}: {message}")]
    Encode { id: u64, message: String },

    #[error("Failed to decode record {id}: {message}")]
    Decode { id: u64, message: String },

    #[error("Record {0} does not exist")]
    NotFound(u64),

    #[error("Record {0} already exists")]
    IdTaken(u64),
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Record store operation failed: {0}")]
    Records(#[from] RecordStoreError),

    #[error("State store operation failed: {0}")]
    State(#[from] StateStoreError),

    #[error("No import session has been started")]
    MissingSession,
}
