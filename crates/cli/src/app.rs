use crate::{config::AppConfig, error::CliError};
use engine_core::{
    event_bus::EventBus,
    state::{StateStore, sled_store::SledStateStore},
};
use engine_processing::{
    executor::TaskExecutor, importer::RecordImporter, records::sled_store::SledRecordStore,
};
use engine_runtime::{
    actor::worker::spawn_worker,
    queue::{BatchQueue, dispatch::DeferredDispatch},
};
use std::{path::Path, sync::Arc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

const STATE_DIR: &str = "state";
const RECORDS_TREE: &str = "records";

/// How processing continues once rows are queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Processing {
    /// An in-process worker actor drains the queue.
    Worker,
    /// Left for a later `work` or `healthcheck` invocation.
    Deferred,
}

/// The wired-up import pipeline for one CLI invocation.
pub struct Engine {
    pub queue: Arc<BatchQueue>,
    pub events: EventBus,
    state: Arc<dyn StateStore>,
    worker: Option<JoinHandle<()>>,
}

impl Engine {
    pub fn open(
        config: &AppConfig,
        processing: Processing,
        cancel: CancellationToken,
    ) -> Result<Self, CliError> {
        let data_dir = config.data_dir()?;
        let (state, store) = open_state_store(&data_dir)?;
        let tree = store.tree(RECORDS_TREE).map_err(|err| {
            CliError::Unexpected(format!("Failed to open record store: {err}"))
        })?;

        let events = EventBus::new();
        let importer = RecordImporter::new(
            Arc::new(SledRecordStore::new(tree)),
            config.schema(),
            events.clone(),
        );
        let executor = TaskExecutor::new(state.clone(), importer);
        let queue_state = state.clone();
        let queue_config = config.queue.clone();

        let (queue, worker) = match processing {
            Processing::Worker => {
                let (queue, handle) = spawn_worker(queue_config.mailbox_capacity, |dispatch| {
                    BatchQueue::new(queue_state, executor, events.clone(), dispatch, queue_config)
                        .with_cancellation(cancel)
                });
                (queue, Some(handle))
            }
            Processing::Deferred => {
                let queue = BatchQueue::new(
                    queue_state,
                    executor,
                    events.clone(),
                    Arc::new(DeferredDispatch),
                    queue_config,
                )
                .with_cancellation(cancel);
                (Arc::new(queue), None)
            }
        };

        info!(data_dir = %data_dir.display(), ?processing, "Engine ready");
        Ok(Engine {
            queue,
            events,
            state,
            worker,
        })
    }

    /// Stops the worker and flushes pending writes to disk.
    pub async fn close(mut self) -> Result<(), CliError> {
        self.shutdown();
        self.state
            .flush()
            .await
            .map_err(|err| CliError::Unexpected(format!("Failed to flush state store: {err}")))
    }

    /// Stops the worker actor, if one was spawned.
    pub fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn open_state_store(data_dir: &Path) -> Result<(Arc<dyn StateStore>, SledStateStore), CliError> {
    let path = data_dir.join(STATE_DIR);
    let store = SledStateStore::open(&path).map_err(|err| {
        CliError::Unexpected(format!(
            "Failed to open state store at {}: {err}",
            path.display()
        ))
    })?;
    Ok((Arc::new(store.clone()), store))
}
