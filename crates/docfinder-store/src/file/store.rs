//! File-backed key-value store.
//!
//! The whole store is a single JSON object persisted at a fixed path and
//! rewritten on every mutation. A missing or corrupted file is treated as
//! an empty store, never as a fatal error.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use docfinder_core::error::AppError;
use docfinder_core::result::AppResult;
use docfinder_core::traits::store::KeyValueStore;

/// File-backed store provider.
#[derive(Debug)]
pub struct FileStore {
    /// Path of the backing JSON file.
    path: PathBuf,
    /// Key → value, write-through to disk.
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open a file store at `path`, creating parent directories as needed.
    ///
    /// The file is read once here; a missing file yields an empty store and
    /// unparseable contents are discarded with a warning.
    pub async fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    AppError::with_source(
                        docfinder_core::error::ErrorKind::Store,
                        format!("Failed to create store directory {}", parent.display()),
                        e,
                    )
                })?;
            }
        }

        let entries = match fs::read_to_string(&path).await {
            Ok(contents) => match serde_json::from_str::<BTreeMap<String, String>>(&contents) {
                Ok(map) => map,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Discarding corrupted store file"
                    );
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(AppError::with_source(
                    docfinder_core::error::ErrorKind::Store,
                    format!("Failed to read store file {}", path.display()),
                    e,
                ));
            }
        };

        debug!(path = %path.display(), entries = entries.len(), "File store opened");

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Persist the current map to disk.
    async fn persist(&self, entries: &BTreeMap<String, String>) -> AppResult<()> {
        let json = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, json).await.map_err(|e| {
            AppError::with_source(
                docfinder_core::error::ErrorKind::Store,
                format!("Failed to write store file {}", self.path.display()),
                e,
            )
        })
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get_item(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> AppResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries).await
    }

    async fn remove_item(&self, key: &str) -> AppResult<()> {
        let mut entries = self.entries.write().await;
        if entries.remove(key).is_some() {
            self.persist(&entries).await?;
        }
        Ok(())
    }
}
