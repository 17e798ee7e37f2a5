//! Store key builders for all DocFinder entries.
//!
//! Centralising key construction prevents typos and makes it easy
//! to find every key the client persists.

/// Prefix applied to all DocFinder store keys.
const PREFIX: &str = "docfinder";

/// Store key for the cached credential pair.
///
/// The cached credential always lives under this single fixed key; it is
/// written whenever the session's credential pair changes and deleted when
/// the session is cleared.
pub fn cached_credentials() -> String {
    format!("{PREFIX}:session:credentials")
}
