use crate::actor::{Actor, ActorContext};
use std::fmt::Debug;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{error, info};

/// Spawns a Tokio task running the actor event loop over a mailbox created
/// by the caller, so the actor's own reference can exist before the actor.
pub fn spawn_with_mailbox<M, A>(
    name: impl Into<String>,
    mut rx: mpsc::Receiver<M>,
    mut actor: A,
) -> JoinHandle<()>
where
    A: Actor<M>,
    M: Send + Debug + 'static,
{
    let ctx = ActorContext::new(name);

    tokio::spawn(async move {
        if let Err(e) = actor.on_start(&ctx).await {
            error!(actor = %ctx.name(), ?e, "actor on_start failed");
            return;
        }

        while let Some(msg) = rx.recv().await {
            if let Err(e) = actor.handle(msg, &ctx).await {
                error!(actor = %ctx.name(), ?e, "actor handle failed");
            }
        }

        if let Err(e) = actor.on_stop(&ctx).await {
            error!(actor = %ctx.name(), ?e, "actor on_stop failed");
        }
        info!(actor = %ctx.name(), "actor stopped");
    })
}
