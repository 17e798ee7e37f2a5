//! Injectable session store with a single-writer contract.

use async_trait::async_trait;
use tokio::sync::watch;

use docfinder_core::traits::credentials::CredentialSource;
use docfinder_core::types::UserProfile;

use crate::state::SessionState;

/// Holds the process-wide [`SessionState`] behind a watch channel.
///
/// Single-writer contract: only the [`SessionBridge`](crate::SessionBridge)
/// mutates the state (via the crate-private [`SessionStore::replace`]);
/// everything else — routing guards, permission checks, the realtime
/// handshake — observes through [`SessionStore::snapshot`] or
/// [`SessionStore::subscribe`].
#[derive(Debug)]
pub struct SessionStore {
    tx: watch::Sender<SessionState>,
    rx: watch::Receiver<SessionState>,
}

impl SessionStore {
    /// Create a store holding an empty guest session.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(SessionState::Guest);
        Self { tx, rx }
    }

    /// The current session state.
    pub fn snapshot(&self) -> SessionState {
        self.rx.borrow().clone()
    }

    /// Subscribe to session state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Whether the current state is authenticated.
    pub fn is_authenticated(&self) -> bool {
        self.rx.borrow().is_authenticated()
    }

    /// The currently validated user, if any.
    pub fn current_user(&self) -> Option<UserProfile> {
        self.rx.borrow().user().cloned()
    }

    /// Replace the session state. Bridge-only.
    pub(crate) fn replace(&self, next: SessionState) {
        // A receiver is held by the store itself, so send cannot fail.
        let _ = self.tx.send(next);
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialSource for SessionStore {
    async fn access_token(&self) -> Option<String> {
        self.rx
            .borrow()
            .credentials()
            .map(|c| c.access_token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use docfinder_core::types::{Credentials, UserRole};
    use uuid::Uuid;

    fn authenticated() -> SessionState {
        SessionState::Authenticated {
            user: UserProfile {
                id: Uuid::new_v4(),
                email: "jo@example.com".into(),
                display_name: "Jo".into(),
                role: UserRole::Member,
            },
            credentials: Credentials::bearer("abc"),
        }
    }

    #[tokio::test]
    async fn test_subscribers_observe_replacements() {
        let store = SessionStore::new();
        let mut rx = store.subscribe();

        assert!(store.snapshot().is_guest());

        store.replace(authenticated());
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_authenticated());
    }

    #[tokio::test]
    async fn test_credential_source_tracks_session() {
        let store = SessionStore::new();
        assert_eq!(store.access_token().await, None);

        store.replace(authenticated());
        assert_eq!(store.access_token().await, Some("abc".to_string()));
    }
}
