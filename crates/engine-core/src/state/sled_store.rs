use crate::{error::StateStoreError, state::StateStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};
use tracing::debug;

/// On-disk value wrapper carrying the optional expiry.
#[derive(Serialize, Deserialize)]
struct Entry {
    /// Unix milliseconds after which the entry is gone.
    expires_at: Option<i64>,
    payload: Vec<u8>,
}

impl Entry {
    fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now_ms)
    }
}

#[derive(Clone)]
pub struct SledStateStore {
    db: sled::Db,
}

impl SledStateStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, sled::Error> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Opens a named tree in the same database, e.g. for record storage.
    pub fn tree(&self, name: &str) -> Result<sled::Tree, sled::Error> {
        self.db.open_tree(name)
    }

    fn decode(key: &str, bytes: &[u8]) -> Result<Entry, StateStoreError> {
        bincode::deserialize(bytes).map_err(|e| StateStoreError::Decode {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    /// Reads `key`, dropping it on the spot if it has expired.
    fn live_entry(&self, key: &str) -> Result<Option<Entry>, StateStoreError> {
        let Some(bytes) = self.db.get(key)? else {
            return Ok(None);
        };

        let entry = Self::decode(key, &bytes)?;
        if entry.is_expired(now_ms()) {
            debug!(key = %key, "Removing expired entry");
            self.db.remove(key)?;
            return Ok(None);
        }
        Ok(Some(entry))
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[async_trait]
impl StateStore for SledStateStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StateStoreError> {
        Ok(self.live_entry(key)?.map(|entry| entry.payload))
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), StateStoreError> {
        let entry = Entry {
            expires_at: ttl.map(|ttl| now_ms().saturating_add(ttl.as_millis() as i64)),
            payload: value,
        };
        let bytes = bincode::serialize(&entry).map_err(|e| StateStoreError::Encode {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        self.db.insert(key, bytes)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StateStoreError> {
        match self.db.remove(key)? {
            Some(bytes) => Ok(!Self::decode(key, &bytes)?.is_expired(now_ms())),
            None => Ok(false),
        }
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StateStoreError> {
        let now = now_ms();
        let mut keys = Vec::new();

        for item in self.db.scan_prefix(prefix) {
            let (key, value) = item?;
            let key = String::from_utf8_lossy(&key).into_owned();
            if !Self::decode(&key, &value)?.is_expired(now) {
                keys.push(key);
            }
        }

        Ok(keys)
    }

    async fn flush(&self) -> Result<(), StateStoreError> {
        self.db.flush_async().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{get_json, put_json};
    use tempfile::tempdir;

    #[tokio::test]
    async fn set_get_delete() {
        let dir = tempdir().unwrap();
        let store = SledStateStore::open(dir.path()).unwrap();

        store.set("a", b"one".to_vec(), None).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(b"one".to_vec()));

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entries_read_as_absent() {
        let dir = tempdir().unwrap();
        let store = SledStateStore::open(dir.path()).unwrap();

        store
            .set("short", b"x".to_vec(), Some(Duration::from_millis(1)))
            .await
            .unwrap();
        store
            .set("long", b"y".to_vec(), Some(Duration::from_secs(3600)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(store.get("short").await.unwrap(), None);
        assert_eq!(store.get("long").await.unwrap(), Some(b"y".to_vec()));
    }

    #[tokio::test]
    async fn prefix_scan_skips_other_and_expired_keys() {
        let dir = tempdir().unwrap();
        let store = SledStateStore::open(dir.path()).unwrap();

        store.set("batch_b", vec![1], None).await.unwrap();
        store.set("batch_a", vec![2], None).await.unwrap();
        store
            .set("batch_gone", vec![3], Some(Duration::from_millis(1)))
            .await
            .unwrap();
        store.set("other", vec![4], None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let keys = store.keys_with_prefix("batch_").await.unwrap();
        assert_eq!(keys, vec!["batch_a".to_string(), "batch_b".to_string()]);
    }

    #[tokio::test]
    async fn json_helpers_round_trip() {
        let dir = tempdir().unwrap();
        let store = SledStateStore::open(dir.path()).unwrap();

        put_json(&store, "numbers", &vec![1u32, 2, 3], None)
            .await
            .unwrap();
        let back: Option<Vec<u32>> = get_json(&store, "numbers").await.unwrap();
        assert_eq!(back, Some(vec![1, 2, 3]));

        let missing: Option<Vec<u32>> = get_json(&store, "nope").await.unwrap();
        assert!(missing.is_none());
    }
}
