use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateStoreError {
    #[error("Storage backend error: {0}")]
    Backend(#[from] sled::Error),

    #[error("Failed to encode value for key '{key}': {message}")]
    Encode { key: String, message: String },

    #[error("Failed to decode value for key '{key}': {message}")]
    Decode { key: String, message: String },
}
