//! Persistent key-value store configuration.

use serde::{Deserialize, Serialize};

/// Persistent key-value store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store provider: `"file"` or `"memory"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Path of the backing file for the `file` provider.
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            path: default_path(),
        }
    }
}

fn default_provider() -> String {
    "file".to_string()
}

fn default_path() -> String {
    "data/docfinder/store.json".to_string()
}
