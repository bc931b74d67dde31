use crate::error::RecordStoreError;
use async_trait::async_trait;
use model::{core::value::Value, schema::ID_FIELD};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

pub mod memory;
pub mod sled_store;

/// Field values written to a record, in write order.
pub type FieldWrites = Vec<(String, Value)>;

/// A persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: u64,
    pub fields: BTreeMap<String, Value>,
}

impl StoredRecord {
    pub fn new(id: u64) -> Self {
        StoredRecord {
            id,
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(&field.to_ascii_lowercase())
    }

    /// Applies a write. A `Null` value clears the field.
    pub fn apply(&mut self, writes: FieldWrites) {
        for (name, value) in writes {
            let name = name.to_ascii_lowercase();
            if value == Value::Null {
                self.fields.remove(&name);
            } else {
                self.fields.insert(name, value);
            }
        }
    }

    /// Whether `field` holds `value`; the id column compares against the key.
    pub fn matches(&self, field: &str, value: &Value) -> bool {
        if field.eq_ignore_ascii_case(ID_FIELD) {
            return value.as_i64() == Some(self.id as i64);
        }
        self.get(field).is_some_and(|stored| stored.equal(value))
    }
}

/// Query and write primitives of the store rows are imported into.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Id of some record other than `exclude_id` whose `field` equals `value`.
    async fn find_duplicate(
        &self,
        field: &str,
        value: &Value,
        exclude_id: Option<u64>,
    ) -> Result<Option<u64>, RecordStoreError>;

    /// Creates a record, under `explicit_id` when given, and returns its id.
    async fn insert(
        &self,
        writes: FieldWrites,
        explicit_id: Option<u64>,
    ) -> Result<u64, RecordStoreError>;

    async fn update(&self, id: u64, writes: FieldWrites) -> Result<(), RecordStoreError>;

    async fn get(&self, id: u64) -> Result<Option<StoredRecord>, RecordStoreError>;

    /// Drops any cached read of `id`.
    async fn invalidate(&self, id: u64);

    async fn count(&self) -> Result<usize, RecordStoreError>;
}

/// Read-side projection of records keyed by id.
#[derive(Debug, Default)]
pub struct ReadCache {
    entries: RwLock<HashMap<u64, StoredRecord>>,
}

impl ReadCache {
    pub async fn get(&self, id: u64) -> Option<StoredRecord> {
        self.entries.read().await.get(&id).cloned()
    }

    pub async fn put(&self, record: StoredRecord) {
        self.entries.write().await.insert(record.id, record);
    }

    pub async fn remove(&self, id: u64) -> bool {
        self.entries.write().await.remove(&id).is_some()
    }

    pub async fn contains(&self, id: u64) -> bool {
        self.entries.read().await.contains_key(&id)
    }
}
