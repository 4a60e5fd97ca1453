//! In-memory key-value store.

use super::KeyValueStore;
use crate::error::BackendResult;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Key-value store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> BackendResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> BackendResult<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn clear(&self) -> BackendResult<()> {
        self.entries.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_set() {
        let store = MemoryStore::new();
        assert_eq!(store.get("students").await.unwrap(), None);

        store.set("students", "[]").await.unwrap();
        assert_eq!(store.get("students").await.unwrap().as_deref(), Some("[]"));

        store.set("students", "[{}]").await.unwrap();
        assert_eq!(store.get("students").await.unwrap().as_deref(), Some("[{}]"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let store = MemoryStore::new();
        store.set("students", "[]").await.unwrap();
        store.set("unrelated", "x").await.unwrap();

        store.clear().await.unwrap();
        assert!(store.is_empty());
        assert_eq!(store.get("unrelated").await.unwrap(), None);
    }
}
