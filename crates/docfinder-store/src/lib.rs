//! # docfinder-store
//!
//! Persistent key-value store implementations for the DocFinder client.
//! Supports two providers:
//!
//! - **file**: JSON document on disk, survives process restarts
//! - **memory**: in-process map, used by tests and ephemeral profiles
//!
//! The provider is selected at runtime based on configuration.

#[cfg(feature = "file")]
pub mod file;
pub mod keys;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;

pub use provider::StoreManager;
