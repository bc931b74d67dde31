use engine_core::error::StateStoreError;
use engine_processing::error::ImportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("State store operation failed: {0}")]
    State(#[from] StateStoreError),

    #[error("Failed to import row: {0}")]
    Import(#[from] ImportError),

    #[error("Failed to dispatch batch processing: {0}")]
    Dispatch(#[from] ActorError),
}

/// Common error type for all actors in the engine.
#[derive(Debug, Error)]
pub enum ActorError {
    #[error("Mailbox closed")]
    MailboxClosed,

    #[error("Mailbox full")]
    MailboxFull,

    #[error("Actor internal error: {0}")]
    Internal(String),
}
