use crate::error::StateStoreError;
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;

pub mod keys;
pub mod sled_store;

/// Durable key-value storage shared by the queue, the tally and the session.
///
/// Entries written with a TTL read back as absent once it has elapsed.
/// There is no atomicity across keys.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StateStoreError>;

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), StateStoreError>;

    /// Removes `key`, returning whether a live entry was present.
    async fn delete(&self, key: &str) -> Result<bool, StateStoreError>;

    /// Live keys starting with `prefix`, in key order.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StateStoreError>;

    async fn flush(&self) -> Result<(), StateStoreError> {
        Ok(())
    }
}

pub async fn get_json<T>(store: &dyn StateStore, key: &str) -> Result<Option<T>, StateStoreError>
where
    T: DeserializeOwned,
{
    match store.get(key).await? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StateStoreError::Decode {
                key: key.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}

pub async fn put_json<T>(
    store: &dyn StateStore,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> Result<(), StateStoreError>
where
    T: Serialize + Sync,
{
    let bytes = serde_json::to_vec(value).map_err(|e| StateStoreError::Encode {
        key: key.to_string(),
        message: e.to_string(),
    })?;
    store.set(key, bytes, ttl).await
}
