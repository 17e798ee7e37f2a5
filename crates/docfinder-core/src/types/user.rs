//! User profile types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Regular member reporting and browsing documents.
    Member,
    /// Administrator managing document-type taxonomies and users.
    Admin,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Member => write!(f, "member"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// A validated user profile returned by the authentication API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Unique user ID.
    pub id: Uuid,
    /// Login identifier (email address).
    pub email: String,
    /// Display name.
    pub display_name: String,
    /// Role.
    pub role: UserRole,
}
