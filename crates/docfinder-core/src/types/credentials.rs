//! Credential pair types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A credential pair: access token plus optional refresh token and expiry.
///
/// This is the exact shape persisted to the key-value store as the cached
/// credential. The client performs no local expiry or integrity check on
/// it; validity is established by exchanging the access token for a
/// profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Bearer access token.
    pub access_token: String,
    /// Optional refresh token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Optional access token expiry, as reported by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credentials {
    /// Credentials consisting of a bare access token.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
        }
    }
}
