use crate::{
    error::RecordStoreError,
    records::{FieldWrites, ReadCache, RecordStore, StoredRecord},
};
use async_trait::async_trait;
use model::core::value::Value;
use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicUsize, Ordering},
};
use tokio::sync::RwLock;

/// Record store held entirely in memory. Counts duplicate queries so callers
/// can observe whether a lookup happened.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<BTreeMap<u64, StoredRecord>>,
    cache: ReadCache,
    queries: AtomicUsize,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `find_duplicate` calls served so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn cache(&self) -> &ReadCache {
        &self.cache
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_duplicate(
        &self,
        field: &str,
        value: &Value,
        exclude_id: Option<u64>,
    ) -> Result<Option<u64>, RecordStoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);

        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|record| Some(record.id) != exclude_id)
            .find(|record| record.matches(field, value))
            .map(|record| record.id))
    }

    async fn insert(
        &self,
        writes: FieldWrites,
        explicit_id: Option<u64>,
    ) -> Result<u64, RecordStoreError> {
        let mut records = self.records.write().await;

        let id = match explicit_id {
            Some(id) if records.contains_key(&id) => return Err(RecordStoreError::IdTaken(id)),
            Some(id) => id,
            None => records.keys().next_back().map_or(1, |last| last + 1),
        };

        let mut record = StoredRecord::new(id);
        record.apply(writes);
        records.insert(id, record);
        Ok(id)
    }

    async fn update(&self, id: u64, writes: FieldWrites) -> Result<(), RecordStoreError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or(RecordStoreError::NotFound(id))?;
        record.apply(writes);
        Ok(())
    }

    async fn get(&self, id: u64) -> Result<Option<StoredRecord>, RecordStoreError> {
        if let Some(record) = self.cache.get(id).await {
            return Ok(Some(record));
        }

        let record = self.records.read().await.get(&id).cloned();
        if let Some(record) = &record {
            self.cache.put(record.clone()).await;
        }
        Ok(record)
    }

    async fn invalidate(&self, id: u64) {
        self.cache.remove(id).await;
    }

    async fn count(&self) -> Result<usize, RecordStoreError> {
        Ok(self.records.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(v: &str) -> FieldWrites {
        vec![("email".to_string(), Value::String(v.to_string()))]
    }

    #[tokio::test]
    async fn auto_ids_continue_after_explicit_ids() {
        let store = MemoryRecordStore::new();
        assert_eq!(store.insert(email("a@x.io"), None).await.unwrap(), 1);
        assert_eq!(store.insert(email("b@x.io"), Some(40)).await.unwrap(), 40);
        assert_eq!(store.insert(email("c@x.io"), None).await.unwrap(), 41);

        let err = store.insert(email("d@x.io"), Some(40)).await.unwrap_err();
        assert!(matches!(err, RecordStoreError::IdTaken(40)));
    }

    #[tokio::test]
    async fn duplicate_lookup_honours_exclusion() {
        let store = MemoryRecordStore::new();
        let id = store.insert(email("a@x.io"), None).await.unwrap();
        let needle = Value::String("a@x.io".into());

        assert_eq!(store.find_duplicate("email", &needle, None).await.unwrap(), Some(id));
        assert_eq!(store.find_duplicate("EMAIL", &needle, Some(id)).await.unwrap(), None);
        assert_eq!(store.query_count(), 2);
    }

    #[tokio::test]
    async fn id_lookup_checks_existence() {
        let store = MemoryRecordStore::new();
        store.insert(email("a@x.io"), Some(7)).await.unwrap();

        assert_eq!(store.find_duplicate("id", &Value::Int(7), None).await.unwrap(), Some(7));
        assert_eq!(store.find_duplicate("id", &Value::Int(8), None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn null_write_clears_field_and_invalidate_drops_cache() {
        let store = MemoryRecordStore::new();
        let id = store.insert(email("a@x.io"), None).await.unwrap();

        store.get(id).await.unwrap();
        assert!(store.cache().contains(id).await);

        store
            .update(id, vec![("email".to_string(), Value::Null)])
            .await
            .unwrap();
        store.invalidate(id).await;
        assert!(!store.cache().contains(id).await);

        let record = store.get(id).await.unwrap().unwrap();
        assert!(record.get("email").is_none());
    }

    #[tokio::test]
    async fn update_of_missing_record_fails() {
        let store = MemoryRecordStore::new();
        let err = store.update(3, email("a@x.io")).await.unwrap_err();
        assert!(matches!(err, RecordStoreError::NotFound(3)));
    }
}
