//! Session cache bridge — restores the session from the persisted
//! credential at startup and keeps the persisted credential synchronized
//! with the session thereafter.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tracing::{info, warn};

use docfinder_core::result::AppResult;
use docfinder_core::traits::store::KeyValueStore;
use docfinder_core::types::{Credentials, UserProfile};
use docfinder_store::keys;

use crate::api::auth::{AuthApi, LoginRequest, RegisterRequest};
use crate::state::SessionState;
use crate::store::SessionStore;

/// Mediates between the persisted credential store and the in-memory
/// session.
///
/// All session mutations go through this bridge and are serialized by a
/// single mutation lock, so `login`/`logout` calls racing across
/// suspension points cannot interleave. Readers observe the session store
/// directly and are never blocked.
///
/// Invariant: the cached credential mirrors the session's credential pair —
/// every credential write here is paired with a store write, every clear
/// with a store delete.
#[derive(Debug)]
pub struct SessionBridge {
    /// The process-wide session store. Only this bridge mutates it.
    session: Arc<SessionStore>,
    /// Authentication API collaborator.
    api: Arc<dyn AuthApi>,
    /// Persistent key-value store holding the cached credential.
    store: Arc<dyn KeyValueStore>,
    /// Serializes all session mutations.
    mutation: Mutex<()>,
    /// Whether startup restoration has already run.
    restored: AtomicBool,
}

impl SessionBridge {
    /// Creates a new session bridge.
    pub fn new(
        session: Arc<SessionStore>,
        api: Arc<dyn AuthApi>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            session,
            api,
            store,
            mutation: Mutex::new(()),
            restored: AtomicBool::new(false),
        }
    }

    /// The session store this bridge writes to.
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Restores the session from the cached credential.
    ///
    /// Runs once per process lifetime; later calls return the current state
    /// without touching the store. The flow:
    ///
    /// 1. Read the cached credential; a missing or unreadable entry leaves
    ///    the session as guest.
    /// 2. Set the session to `Restoring` immediately (optimistic).
    /// 3. Exchange the access token for a profile. Success authenticates
    ///    the session; failure records the reason as `Invalid` but clears
    ///    neither the session credential nor the cached one — forcing a
    ///    logout is the caller's decision.
    ///
    /// Never fails: every error on this path is recovered locally.
    pub async fn restore_on_startup(&self) -> SessionState {
        if self.restored.swap(true, Ordering::SeqCst) {
            return self.session.snapshot();
        }

        let _guard = self.mutation.lock().await;

        let key = keys::cached_credentials();
        let credentials = match self.store.get_item(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<Credentials>(&raw) {
                Ok(credentials) => credentials,
                Err(e) => {
                    warn!(error = %e, "Discarding corrupted cached credential");
                    let _ = self.store.remove_item(&key).await;
                    return self.session.snapshot();
                }
            },
            Ok(None) => {
                info!("No cached credential, starting as guest");
                return self.session.snapshot();
            }
            Err(e) => {
                warn!(error = %e, "Failed to read cached credential, starting as guest");
                return self.session.snapshot();
            }
        };

        self.session.replace(SessionState::Restoring {
            credentials: credentials.clone(),
        });

        match self.api.profile(&credentials.access_token).await {
            Ok(user) => {
                info!(user_id = %user.id, "Session restored from cached credential");
                self.session.replace(SessionState::Authenticated {
                    user,
                    credentials,
                });
            }
            Err(e) => {
                warn!(error = %e, "Cached credential failed validation");
                self.session.replace(SessionState::Invalid {
                    credentials,
                    reason: e.to_string(),
                });
            }
        }

        self.session.snapshot()
    }

    /// Performs the login flow:
    ///
    /// 1. Exchange the credentials with the authentication API
    /// 2. Persist the new credential pair, overwriting any prior one
    /// 3. Update the session to authenticated
    pub async fn login(&self, request: LoginRequest) -> AppResult<UserProfile> {
        let _guard = self.mutation.lock().await;

        let payload = self.api.login(&request).await?;
        self.apply_credentials(payload.user, payload.credentials)
            .await
    }

    /// Performs the registration flow; on success the new account is
    /// logged in exactly as [`SessionBridge::login`] would.
    pub async fn register(&self, request: RegisterRequest) -> AppResult<UserProfile> {
        let _guard = self.mutation.lock().await;

        let payload = self.api.register(&request).await?;
        self.apply_credentials(payload.user, payload.credentials)
            .await
    }

    /// Performs the logout flow:
    ///
    /// 1. Clear the session to guest
    /// 2. Delete the cached credential
    /// 3. Best-effort server-side invalidation — its failure never blocks
    ///    the local clearing above
    pub async fn logout(&self) -> AppResult<()> {
        let _guard = self.mutation.lock().await;

        let access_token = self
            .session
            .snapshot()
            .credentials()
            .map(|c| c.access_token.clone());

        self.session.replace(SessionState::Guest);
        self.store.remove_item(&keys::cached_credentials()).await?;

        if let Some(token) = access_token {
            if let Err(e) = self.api.invalidate(&token).await {
                warn!(error = %e, "Server-side session invalidation failed");
            }
        }

        info!("Logged out");
        Ok(())
    }

    /// Persists `credentials` and updates the session. Callers hold the
    /// mutation lock.
    async fn apply_credentials(
        &self,
        user: UserProfile,
        credentials: Credentials,
    ) -> AppResult<UserProfile> {
        let raw = serde_json::to_string(&credentials)?;
        self.store
            .set_item(&keys::cached_credentials(), &raw)
            .await?;

        info!(user_id = %user.id, "Session authenticated");
        self.session.replace(SessionState::Authenticated {
            user: user.clone(),
            credentials,
        });

        Ok(user)
    }
}
