use crate::error::ActorError;
use async_trait::async_trait;
use tracing::debug;

/// Continues batch processing outside the current call.
///
/// Implementations must eventually cause [`super::BatchQueue::handle`] to run.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self) -> Result<(), ActorError>;
}

/// Leaves processing to a later healthcheck, e.g. from another process.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeferredDispatch;

#[async_trait]
impl Dispatch for DeferredDispatch {
    async fn dispatch(&self) -> Result<(), ActorError> {
        debug!("Dispatch deferred to the next healthcheck");
        Ok(())
    }
}
