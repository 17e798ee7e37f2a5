//! # docfinder-core
//!
//! Core crate for the DocFinder client. Contains collaborator traits,
//! configuration schemas, shared types, and the unified error system.
//!
//! This crate has **no** internal dependencies on other DocFinder crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
