//! # docfinder-session
//!
//! Session management for the DocFinder client:
//!
//! - Tagged session state (`Guest | Restoring | Authenticated | Invalid`)
//! - A watch-based session store with a single-writer contract
//! - The authentication API client (login, register, profile lookup)
//! - The session cache bridge keeping the persisted credential in sync
//!   with the in-memory session

pub mod api;
pub mod bridge;
pub mod state;
pub mod store;

pub use bridge::SessionBridge;
pub use state::SessionState;
pub use store::SessionStore;
