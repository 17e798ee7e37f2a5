//! Store manager that dispatches to the configured provider.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use docfinder_core::config::store::StoreConfig;
use docfinder_core::error::AppError;
use docfinder_core::result::AppResult;
use docfinder_core::traits::store::KeyValueStore;

/// Store manager that wraps the configured key-value store provider.
///
/// The provider is selected at construction time based on configuration.
#[derive(Debug, Clone)]
pub struct StoreManager {
    /// The inner store provider.
    inner: Arc<dyn KeyValueStore>,
}

impl StoreManager {
    /// Create a new store manager from configuration.
    pub async fn new(config: &StoreConfig) -> AppResult<Self> {
        let inner: Arc<dyn KeyValueStore> = match config.provider.as_str() {
            #[cfg(feature = "file")]
            "file" => {
                info!(path = %config.path, "Initializing file store provider");
                let provider = crate::file::FileStore::open(&config.path).await?;
                Arc::new(provider)
            }
            #[cfg(feature = "memory")]
            "memory" => {
                info!("Initializing in-memory store provider");
                Arc::new(crate::memory::MemoryStore::new())
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown store provider: '{other}'. Supported: file, memory"
                )));
            }
        };

        Ok(Self { inner })
    }

    /// Create a store manager from an existing provider (for testing).
    pub fn from_provider(provider: Arc<dyn KeyValueStore>) -> Self {
        Self { inner: provider }
    }

    /// Get a reference to the inner provider.
    pub fn provider(&self) -> &dyn KeyValueStore {
        self.inner.as_ref()
    }
}

#[async_trait]
impl KeyValueStore for StoreManager {
    async fn get_item(&self, key: &str) -> AppResult<Option<String>> {
        self.inner.get_item(key).await
    }

    async fn set_item(&self, key: &str, value: &str) -> AppResult<()> {
        self.inner.set_item(key, value).await
    }

    async fn remove_item(&self, key: &str) -> AppResult<()> {
        self.inner.remove_item(key).await
    }
}
