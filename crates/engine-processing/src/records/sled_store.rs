use crate::{
    error::RecordStoreError,
    records::{FieldWrites, ReadCache, RecordStore, StoredRecord},
};
use async_trait::async_trait;
use model::core::value::Value;
use tracing::debug;

/// Record store backed by a sled tree. Keys are big-endian ids so the tree
/// iterates in id order; values are JSON.
pub struct SledRecordStore {
    tree: sled::Tree,
    cache: ReadCache,
}

impl SledRecordStore {
    pub fn new(tree: sled::Tree) -> Self {
        SledRecordStore {
            tree,
            cache: ReadCache::default(),
        }
    }

    fn decode_id(key: &[u8]) -> Result<u64, RecordStoreError> {
        let bytes: [u8; 8] = key.try_into().map_err(|_| RecordStoreError::Decode {
            id: 0,
            message: format!("malformed key of {} bytes", key.len()),
        })?;
        Ok(u64::from_be_bytes(bytes))
    }

    fn decode(id: u64, bytes: &[u8]) -> Result<StoredRecord, RecordStoreError> {
        serde_json::from_slice(bytes).map_err(|e| RecordStoreError::Decode {
            id,
            message: e.to_string(),
        })
    }

    fn encode(record: &StoredRecord) -> Result<Vec<u8>, RecordStoreError> {
        serde_json::to_vec(record).map_err(|e| RecordStoreError::Encode {
            id: record.id,
            message: e.to_string(),
        })
    }

    fn next_id(&self) -> Result<u64, RecordStoreError> {
        match self.tree.last()? {
            Some((key, _)) => Ok(Self::decode_id(&key)? + 1),
            None => Ok(1),
        }
    }
}

#[async_trait]
impl RecordStore for SledRecordStore {
    async fn find_duplicate(
        &self,
        field: &str,
        value: &Value,
        exclude_id: Option<u64>,
    ) -> Result<Option<u64>, RecordStoreError> {
        for item in self.tree.iter() {
            let (key, bytes) = item?;
            let id = Self::decode_id(&key)?;
            if Some(id) == exclude_id {
                continue;
            }
            if Self::decode(id, &bytes)?.matches(field, value) {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }

    async fn insert(
        &self,
        writes: FieldWrites,
        explicit_id: Option<u64>,
    ) -> Result<u64, RecordStoreError> {
        let id = match explicit_id {
            Some(id) => id,
            None => self.next_id()?,
        };

        let mut record = StoredRecord::new(id);
        record.apply(writes);
        let bytes = Self::encode(&record)?;

        self.tree
            .compare_and_swap(id.to_be_bytes(), None as Option<&[u8]>, Some(bytes))?
            .map_err(|_| RecordStoreError::IdTaken(id))?;

        debug!(record_id = id, "Inserted record");
        Ok(id)
    }

    async fn update(&self, id: u64, writes: FieldWrites) -> Result<(), RecordStoreError> {
        let key = id.to_be_bytes();
        let bytes = self.tree.get(key)?.ok_or(RecordStoreError::NotFound(id))?;

        let mut record = Self::decode(id, &bytes)?;
        record.apply(writes);
        self.tree.insert(key, Self::encode(&record)?)?;

        debug!(record_id = id, "Updated record");
        Ok(())
    }

    async fn get(&self, id: u64) -> Result<Option<StoredRecord>, RecordStoreError> {
        if let Some(record) = self.cache.get(id).await {
            return Ok(Some(record));
        }

        let Some(bytes) = self.tree.get(id.to_be_bytes())? else {
            return Ok(None);
        };
        let record = Self::decode(id, &bytes)?;
        self.cache.put(record.clone()).await;
        Ok(Some(record))
    }

    async fn invalidate(&self, id: u64) {
        self.cache.remove(id).await;
    }

    async fn count(&self) -> Result<usize, RecordStoreError> {
        Ok(self.tree.len())
    }
}
