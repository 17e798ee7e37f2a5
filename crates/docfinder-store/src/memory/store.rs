//! In-memory key-value store backed by a concurrent map.

use async_trait::async_trait;
use dashmap::DashMap;

use docfinder_core::result::AppResult;
use docfinder_core::traits::store::KeyValueStore;

/// In-memory store provider.
///
/// Ephemeral: contents are lost when the process exits. Used by tests and
/// as an opt-in profile for environments without a writable disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Key → value.
    entries: DashMap<String, String>,
}

impl MemoryStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_item(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set_item(&self, key: &str, value: &str) -> AppResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> AppResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}
