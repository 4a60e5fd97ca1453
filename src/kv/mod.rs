//! Key-value backends.
//!
//! The record store persists every collection as one JSON string under the
//! collection's name. Backends only need to move strings around:
//!
//! - [`MemoryStore`]: process-local map, for tests and ephemeral use
//! - [`FileStore`]: one checksummed file per key in a locked directory
//!
//! Backends serialize individual `get`/`set` calls but provide no
//! transactions across calls.

mod file;
mod memory;

pub use file::{FileStore, FileStoreConfig};
pub use memory::MemoryStore;

use crate::error::BackendResult;
use async_trait::async_trait;
use std::sync::Arc;

/// An asynchronous string key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> BackendResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> BackendResult<()>;

    /// Remove every key.
    async fn clear(&self) -> BackendResult<()>;
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    async fn get(&self, key: &str) -> BackendResult<Option<String>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> BackendResult<()> {
        (**self).set(key, value).await
    }

    async fn clear(&self) -> BackendResult<()> {
        (**self).clear().await
    }
}
