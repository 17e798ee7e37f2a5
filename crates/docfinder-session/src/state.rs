//! Tagged session state.

use serde::{Deserialize, Serialize};

use docfinder_core::types::{Credentials, UserProfile};

/// Process-wide authentication state.
///
/// The `Restoring` variant makes the "token present but not yet validated"
/// window explicit: a cached credential has been loaded optimistically, and
/// the profile lookup that validates it is still in flight. `Invalid`
/// records a credential whose validation failed; the credential is kept so
/// the caller can decide whether to force a logout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// No credential and no user: browsing as a guest.
    Guest,
    /// A cached credential was loaded; validation is in flight.
    Restoring {
        /// The credential pair pending validation.
        credentials: Credentials,
    },
    /// A validated user with its credential pair.
    Authenticated {
        /// The validated user profile.
        user: UserProfile,
        /// The credential pair backing this session.
        credentials: Credentials,
    },
    /// A credential whose validation failed.
    Invalid {
        /// The credential pair that failed validation.
        credentials: Credentials,
        /// Why validation failed.
        reason: String,
    },
}

impl SessionState {
    /// True only when a validated user profile and credential pair are both
    /// present.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// True when there is neither a credential nor a user.
    pub fn is_guest(&self) -> bool {
        matches!(self, Self::Guest)
    }

    /// The credential pair held by this state, if any.
    pub fn credentials(&self) -> Option<&Credentials> {
        match self {
            Self::Guest => None,
            Self::Restoring { credentials }
            | Self::Authenticated { credentials, .. }
            | Self::Invalid { credentials, .. } => Some(credentials),
        }
    }

    /// The validated user profile, if any.
    pub fn user(&self) -> Option<&UserProfile> {
        match self {
            Self::Authenticated { user, .. } => Some(user),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_authenticated_counts_as_authenticated() {
        let credentials = Credentials::bearer("abc");

        assert!(!SessionState::Guest.is_authenticated());
        assert!(
            !SessionState::Restoring {
                credentials: credentials.clone()
            }
            .is_authenticated()
        );
        assert!(
            !SessionState::Invalid {
                credentials,
                reason: "expired".into()
            }
            .is_authenticated()
        );
    }

    #[test]
    fn test_credentials_visible_in_every_non_guest_state() {
        let credentials = Credentials::bearer("abc");

        assert!(SessionState::Guest.credentials().is_none());
        assert_eq!(
            SessionState::Restoring {
                credentials: credentials.clone()
            }
            .credentials()
            .map(|c| c.access_token.clone()),
            Some("abc".to_string())
        );
        assert_eq!(
            SessionState::Invalid {
                credentials,
                reason: "expired".into()
            }
            .credentials()
            .map(|c| c.access_token.clone()),
            Some("abc".to_string())
        );
    }
}
