use crate::{
    actor::{
        actor::{Actor, ActorContext, ActorRef},
        messages::WorkerMsg,
        spawn::spawn_with_mailbox,
    },
    error::ActorError,
    queue::{BatchQueue, dispatch::Dispatch},
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error, info};

const WORKER_NAME: &str = "import-worker";

/// Hands processing to the in-process worker actor.
pub struct WorkerDispatch {
    worker: ActorRef<WorkerMsg>,
}

impl WorkerDispatch {
    pub fn new(worker: ActorRef<WorkerMsg>) -> Self {
        WorkerDispatch { worker }
    }
}

#[async_trait]
impl Dispatch for WorkerDispatch {
    async fn dispatch(&self) -> Result<(), ActorError> {
        // Called from inside the worker when it yields, so never wait for room.
        match self.worker.try_send(WorkerMsg::Process) {
            Err(ActorError::MailboxFull) => {
                debug!(actor = self.worker.name(), "Processing already pending");
                Ok(())
            }
            other => other,
        }
    }
}

pub struct WorkerActor {
    queue: Arc<BatchQueue>,
}

impl WorkerActor {
    pub fn new(queue: Arc<BatchQueue>) -> Self {
        WorkerActor { queue }
    }
}

#[async_trait]
impl Actor<WorkerMsg> for WorkerActor {
    async fn on_start(&mut self, ctx: &ActorContext) -> Result<(), ActorError> {
        info!(actor = ctx.name(), "Worker actor started");
        Ok(())
    }

    async fn handle(&mut self, msg: WorkerMsg, ctx: &ActorContext) -> Result<(), ActorError> {
        match msg {
            WorkerMsg::Process => match self.queue.handle().await {
                Ok(outcome) => {
                    debug!(actor = ctx.name(), ?outcome, "Worker pass finished");
                }
                Err(e) => {
                    // Rows stay persisted; the next healthcheck retries them.
                    error!(actor = ctx.name(), error = %e, "Batch processing failed");
                    return Err(ActorError::Internal(e.to_string()));
                }
            },
        }
        Ok(())
    }
}

/// Builds a queue whose dispatches run on a freshly spawned worker actor.
///
/// The worker's mailbox is created first so `build` can wire its dispatcher
/// into the queue the worker then drives.
pub fn spawn_worker<F>(mailbox_capacity: usize, build: F) -> (Arc<BatchQueue>, JoinHandle<()>)
where
    F: FnOnce(Arc<dyn Dispatch>) -> BatchQueue,
{
    let (tx, rx) = mpsc::channel(mailbox_capacity);
    let worker_ref = ActorRef::new(WORKER_NAME, tx);

    let queue = Arc::new(build(Arc::new(WorkerDispatch::new(worker_ref))));
    let handle = spawn_with_mailbox(WORKER_NAME, rx, WorkerActor::new(queue.clone()));

    (queue, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::config::QueueConfig;
    use engine_core::{
        event_bus::EventBus,
        state::{StateStore, sled_store::SledStateStore},
    };
    use engine_processing::{
        executor::TaskExecutor,
        importer::RecordImporter,
        records::{RecordStore, memory::MemoryRecordStore},
    };
    use model::{
        events::ProcessCompleted,
        records::row::Row,
        schema::RecordSchema,
        session::{DuplicateMode, ImportSession},
    };
    use std::time::Duration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn worker_drains_dispatched_queue() {
        let dir = tempdir().unwrap();
        let state: Arc<dyn StateStore> = Arc::new(SledStateStore::open(dir.path()).unwrap());
        let records = Arc::new(MemoryRecordStore::new());
        let events = EventBus::new();
        let config = QueueConfig {
            time_limit_secs: 0,
            ..QueueConfig::default()
        };

        let importer = RecordImporter::new(records.clone(), RecordSchema::default(), events.clone());
        let executor = TaskExecutor::new(state.clone(), importer);
        let (queue, _handle) = spawn_worker(config.mailbox_capacity, |dispatch| {
            BatchQueue::new(state.clone(), executor, events.clone(), dispatch, config)
        });
        let (_sub, mut done) = events.channel::<ProcessCompleted>(4).await;

        let session = ImportSession::new(vec!["title".into()], DuplicateMode::Add, "title")
            .with_background(true);
        queue.start(&session).await.unwrap();
        for title in ["one", "two", "three"] {
            queue.push(Row::from(vec![title])).await.unwrap();
        }
        queue.save().await.unwrap();
        queue.dispatch().await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), done.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.rows_imported, 3);
        assert_eq!(records.count().await.unwrap(), 3);
        assert_eq!(queue.status().await.unwrap().batches, 0);
    }
}
