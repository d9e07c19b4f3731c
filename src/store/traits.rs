//! Durable key-value store interface.
//!
//! Backends map string keys to string values. Absence is `Ok(None)`, never
//! an error; errors mean the backend could not answer.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("store returned HTTP {0}")]
    Status(u16),
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value under `key`.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Remove `key`. Removing a missing key succeeds.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}
