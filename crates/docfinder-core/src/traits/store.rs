//! Key-value store trait for pluggable persistence backends.

use async_trait::async_trait;

use crate::result::AppResult;

/// Trait for durable client-side key-value stores (file-backed or in-memory).
///
/// All values are stored as strings (JSON). The store is expected to survive
/// process restarts for the `file` provider; the `memory` provider is
/// ephemeral and used by tests.
#[async_trait]
pub trait KeyValueStore: Send + Sync + std::fmt::Debug + 'static {
    /// Get a value by key. Returns `None` if the key does not exist.
    async fn get_item(&self, key: &str) -> AppResult<Option<String>>;

    /// Set a value, overwriting any existing value under the key.
    async fn set_item(&self, key: &str, value: &str) -> AppResult<()>;

    /// Remove a key from the store. Removing an absent key is not an error.
    async fn remove_item(&self, key: &str) -> AppResult<()>;

    /// Get a typed value by deserializing from JSON.
    async fn get_json<T: serde::de::DeserializeOwned + Send>(
        &self,
        key: &str,
    ) -> AppResult<Option<T>>
    where
        Self: Sized,
    {
        match self.get_item(key).await? {
            Some(value) => {
                let parsed = serde_json::from_str(&value)?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    /// Set a typed value by serializing to JSON.
    async fn set_json<T: serde::Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
    ) -> AppResult<()>
    where
        Self: Sized,
    {
        let json = serde_json::to_string(value)?;
        self.set_item(key, &json).await
    }
}
