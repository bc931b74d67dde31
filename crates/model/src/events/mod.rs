use crate::{core::value::Value, records::action::RecordAction};
use std::fmt::Debug;

/// A trait for events that can be published on the EventBus.
pub trait Event: Send + Sync + Debug + 'static {
    /// Returns a unique identifier for this event type.
    fn event_type(&self) -> &'static str;
}

/// Emitted after a batch of rows has been persisted to the queue.
#[derive(Debug, Clone)]
pub struct QueueSaved {
    pub batch_id: String,
    pub row_count: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl Event for QueueSaved {
    fn event_type(&self) -> &'static str {
        "queue.saved"
    }
}

/// Emitted for every field that passed validation while a row was imported.
#[derive(Debug, Clone)]
pub struct FieldProcessed {
    pub field: String,
    pub value: Value,
    pub action: RecordAction,
    /// Whether the value ended up in the write.
    pub written: bool,
}

impl Event for FieldProcessed {
    fn event_type(&self) -> &'static str {
        "field.processed"
    }
}

/// Emitted after a record has been inserted or updated.
#[derive(Debug, Clone)]
pub struct RecordImported {
    pub record_id: u64,
    pub action: RecordAction,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl Event for RecordImported {
    fn event_type(&self) -> &'static str {
        "record.imported"
    }
}

/// Emitted right before a persisted batch is removed from the queue.
#[derive(Debug, Clone)]
pub struct QueueEntryDeleted {
    pub batch_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl Event for QueueEntryDeleted {
    fn event_type(&self) -> &'static str {
        "queue.deleted"
    }
}

/// Emitted once the persisted queue has been drained or aborted.
#[derive(Debug, Clone)]
pub struct ProcessCompleted {
    pub aborted: bool,
    pub rows_imported: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl Event for ProcessCompleted {
    fn event_type(&self) -> &'static str {
        "process.completed"
    }
}
