use engine_core::{
    event_bus::EventBus,
    state::{StateStore, sled_store::SledStateStore},
    tally::TallyState,
};
use engine_processing::{
    executor::TaskExecutor,
    importer::RecordImporter,
    records::{RecordStore, StoredRecord, memory::MemoryRecordStore},
};
use engine_runtime::queue::{BatchQueue, config::QueueConfig, dispatch::DeferredDispatch};
use model::{
    core::value::Value,
    records::row::Row,
    schema::RecordSchema,
    session::{DuplicateMode, ImportSession},
};
use std::sync::Arc;
use tempfile::TempDir;

/// A queue over a throwaway sled database and an in-memory record store.
///
/// Dispatches are deferred, so tests drive `handle` and `healthcheck`
/// themselves the way separate worker and cron processes would.
pub struct Harness {
    _dir: TempDir,
    pub state: Arc<dyn StateStore>,
    pub records: Arc<MemoryRecordStore>,
    pub events: EventBus,
    pub queue: BatchQueue,
}

impl Harness {
    pub fn new(schema: RecordSchema) -> Self {
        Self::with_config(schema, QueueConfig::default())
    }

    pub fn with_config(schema: RecordSchema, config: QueueConfig) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let state: Arc<dyn StateStore> =
            Arc::new(SledStateStore::open(dir.path()).expect("open sled"));
        let records = Arc::new(MemoryRecordStore::new());
        let events = EventBus::new();

        let importer = RecordImporter::new(records.clone(), schema, events.clone());
        let queue = BatchQueue::new(
            state.clone(),
            TaskExecutor::new(state.clone(), importer),
            events.clone(),
            Arc::new(DeferredDispatch),
            config,
        );

        Harness {
            _dir: dir,
            state,
            records,
            events,
            queue,
        }
    }

    /// Stores a record directly, bypassing the importer.
    pub async fn seed(&self, id: u64, fields: &[(&str, &str)]) {
        let writes = fields
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        self.records.insert(writes, Some(id)).await.expect("seed");
    }

    pub async fn record(&self, id: u64) -> Option<StoredRecord> {
        self.records.get(id).await.expect("read record")
    }

    /// Starts a session and pushes every row, then saves them when queued.
    /// Returns the id of the first saved batch.
    pub async fn load(&self, session: &ImportSession, rows: &[&[&str]]) -> Option<String> {
        self.queue.start(session).await.expect("start");
        for row in rows {
            self.queue.push(Row::from(row.to_vec())).await.expect("push");
        }
        if session.is_background() {
            self.queue.save().await.expect("save").into_iter().next()
        } else {
            None
        }
    }

    pub async fn tally(&self) -> TallyState {
        self.queue.status().await.expect("status").tally
    }
}

pub fn session(columns: &[&str], mode: DuplicateMode, match_field: &str) -> ImportSession {
    ImportSession::new(
        columns.iter().map(|c| c.to_string()).collect(),
        mode,
        match_field,
    )
}

pub fn text(value: &str) -> Value {
    Value::String(value.to_string())
}
