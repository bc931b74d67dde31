use crate::error::ActorError;
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};
use tokio::sync::mpsc;

/// Identity handed to every actor callback.
#[derive(Debug, Clone)]
pub struct ActorContext {
    name: Arc<str>,
}

impl ActorContext {
    pub fn new(name: impl Into<String>) -> Self {
        ActorContext {
            name: Arc::from(name.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A task that owns its state and reacts to messages of type `M`, one at a
/// time, in arrival order.
///
/// `on_start` runs before the first message and `on_stop` after the mailbox
/// closes.
#[async_trait]
pub trait Actor<M>: Send + 'static
where
    M: Send + Debug + 'static,
{
    async fn on_start(&mut self, _ctx: &ActorContext) -> Result<(), ActorError> {
        Ok(())
    }

    async fn handle(&mut self, msg: M, ctx: &ActorContext) -> Result<(), ActorError>;

    async fn on_stop(&mut self, _ctx: &ActorContext) -> Result<(), ActorError> {
        Ok(())
    }
}

/// Cloneable address of a running actor.
#[derive(Debug)]
pub struct ActorRef<M>
where
    M: Send + Debug + 'static,
{
    name: Arc<str>,
    tx: mpsc::Sender<M>,
}

impl<M> Clone for ActorRef<M>
where
    M: Send + Debug + 'static,
{
    fn clone(&self) -> Self {
        ActorRef {
            name: self.name.clone(),
            tx: self.tx.clone(),
        }
    }
}

impl<M> ActorRef<M>
where
    M: Send + Debug + 'static,
{
    pub fn new(name: impl Into<String>, tx: mpsc::Sender<M>) -> Self {
        ActorRef {
            name: Arc::from(name.into()),
            tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Delivers `msg` only if the mailbox has room right now.
    pub fn try_send(&self, msg: M) -> Result<(), ActorError> {
        self.tx.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ActorError::MailboxFull,
            mpsc::error::TrySendError::Closed(_) => ActorError::MailboxClosed,
        })
    }
}
