//! Integration tests for the session cache bridge over a mock
//! authentication API and an in-memory store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use docfinder_core::error::AppError;
use docfinder_core::result::AppResult;
use docfinder_core::traits::store::KeyValueStore;
use docfinder_core::types::{Credentials, UserProfile, UserRole};
use docfinder_session::api::auth::{AuthApi, AuthPayload, LoginRequest, RegisterRequest};
use docfinder_session::bridge::SessionBridge;
use docfinder_session::state::SessionState;
use docfinder_session::store::SessionStore;
use docfinder_store::keys;
use docfinder_store::memory::MemoryStore;

/// Scripted authentication API.
#[derive(Debug, Default)]
struct MockAuthApi {
    /// Tokens that validate, with the profile each resolves to.
    profiles: Mutex<HashMap<String, UserProfile>>,
    /// Payload returned by a successful login/register.
    auth_payload: Mutex<Option<AuthPayload>>,
    /// Tokens passed to `invalidate`.
    invalidated: Mutex<Vec<String>>,
    /// Number of profile lookups performed.
    profile_calls: AtomicUsize,
}

impl MockAuthApi {
    fn with_profile(token: &str, user: UserProfile) -> Self {
        let api = Self::default();
        api.profiles
            .lock()
            .unwrap()
            .insert(token.to_string(), user);
        api
    }

    fn with_auth_payload(payload: AuthPayload) -> Self {
        let api = Self::default();
        *api.auth_payload.lock().unwrap() = Some(payload);
        api
    }

    fn invalidated_tokens(&self) -> Vec<String> {
        self.invalidated.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthApi for MockAuthApi {
    async fn login(&self, _request: &LoginRequest) -> AppResult<AuthPayload> {
        self.auth_payload
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::authentication("Invalid email or password"))
    }

    async fn register(&self, _request: &RegisterRequest) -> AppResult<AuthPayload> {
        self.auth_payload
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::validation("Email already registered"))
    }

    async fn profile(&self, access_token: &str) -> AppResult<UserProfile> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        self.profiles
            .lock()
            .unwrap()
            .get(access_token)
            .cloned()
            .ok_or_else(|| AppError::authentication("Token expired"))
    }

    async fn invalidate(&self, access_token: &str) -> AppResult<()> {
        self.invalidated
            .lock()
            .unwrap()
            .push(access_token.to_string());
        Ok(())
    }
}

fn user(name: &str) -> UserProfile {
    UserProfile {
        id: Uuid::new_v4(),
        email: format!("{}@example.com", name.to_lowercase()),
        display_name: name.to_string(),
        role: UserRole::Member,
    }
}

fn bridge_with(api: MockAuthApi, store: Arc<MemoryStore>) -> SessionBridge {
    SessionBridge::new(Arc::new(SessionStore::new()), Arc::new(api), store)
}

async fn cache_credentials(store: &MemoryStore, credentials: &Credentials) {
    store
        .set_item(
            &keys::cached_credentials(),
            &serde_json::to_string(credentials).unwrap(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_restore_with_valid_cached_credential() {
    let store = Arc::new(MemoryStore::new());
    cache_credentials(&store, &Credentials::bearer("abc")).await;

    let jo = user("Jo");
    let bridge = bridge_with(MockAuthApi::with_profile("abc", jo.clone()), store);

    let state = bridge.restore_on_startup().await;

    assert!(state.is_authenticated());
    assert_eq!(state.user(), Some(&jo));
    assert_eq!(
        state.credentials().map(|c| c.access_token.as_str()),
        Some("abc")
    );
}

#[tokio::test]
async fn test_restore_with_failing_validation_leaves_unauthenticated() {
    let store = Arc::new(MemoryStore::new());
    cache_credentials(&store, &Credentials::bearer("expired")).await;

    // No profile registered for "expired": the lookup fails.
    let bridge = bridge_with(MockAuthApi::default(), Arc::clone(&store));
    let state = bridge.restore_on_startup().await;

    assert!(!state.is_authenticated());
    assert!(matches!(state, SessionState::Invalid { .. }));

    // Neither the session credential nor the cached one was cleared.
    assert_eq!(
        state.credentials().map(|c| c.access_token.as_str()),
        Some("expired")
    );
    assert!(
        store
            .get_item(&keys::cached_credentials())
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn test_restore_with_absent_credential_is_guest() {
    let bridge = bridge_with(MockAuthApi::default(), Arc::new(MemoryStore::new()));
    let state = bridge.restore_on_startup().await;
    assert!(state.is_guest());
}

#[tokio::test]
async fn test_restore_discards_corrupted_credential() {
    let store = Arc::new(MemoryStore::new());
    store
        .set_item(&keys::cached_credentials(), "{not json")
        .await
        .unwrap();

    let bridge = bridge_with(MockAuthApi::default(), Arc::clone(&store));
    let state = bridge.restore_on_startup().await;

    assert!(state.is_guest());
    assert!(
        store
            .get_item(&keys::cached_credentials())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_restore_runs_once_per_process() {
    let store = Arc::new(MemoryStore::new());
    cache_credentials(&store, &Credentials::bearer("abc")).await;

    let api = Arc::new(MockAuthApi::with_profile("abc", user("Jo")));
    let bridge = SessionBridge::new(
        Arc::new(SessionStore::new()),
        Arc::clone(&api) as Arc<dyn AuthApi>,
        store,
    );

    bridge.restore_on_startup().await;
    bridge.restore_on_startup().await;

    assert_eq!(api.profile_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_login_overwrites_cached_credential() {
    let store = Arc::new(MemoryStore::new());
    cache_credentials(&store, &Credentials::bearer("stale")).await;

    let jo = user("Jo");
    let payload = AuthPayload {
        user: jo.clone(),
        credentials: Credentials::bearer("fresh"),
    };
    let bridge = bridge_with(MockAuthApi::with_auth_payload(payload), Arc::clone(&store));

    let logged_in = bridge
        .login(LoginRequest {
            email: "jo@example.com".into(),
            password: "secret".into(),
        })
        .await
        .unwrap();

    assert_eq!(logged_in, jo);
    assert!(bridge.session().is_authenticated());

    let cached: Credentials = serde_json::from_str(
        &store
            .get_item(&keys::cached_credentials())
            .await
            .unwrap()
            .unwrap(),
    )
    .unwrap();
    assert_eq!(cached.access_token, "fresh");
}

#[tokio::test]
async fn test_failed_login_leaves_session_untouched() {
    let bridge = bridge_with(MockAuthApi::default(), Arc::new(MemoryStore::new()));

    let err = bridge
        .login(LoginRequest {
            email: "jo@example.com".into(),
            password: "wrong".into(),
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind, docfinder_core::error::ErrorKind::Authentication);
    assert!(bridge.session().snapshot().is_guest());
}

#[tokio::test]
async fn test_logout_clears_session_and_credential() {
    let store = Arc::new(MemoryStore::new());
    let jo = user("Jo");
    let payload = AuthPayload {
        user: jo,
        credentials: Credentials::bearer("tok"),
    };
    let api = Arc::new(MockAuthApi::with_auth_payload(payload));
    let bridge = SessionBridge::new(
        Arc::new(SessionStore::new()),
        Arc::clone(&api) as Arc<dyn AuthApi>,
        Arc::clone(&store) as Arc<dyn KeyValueStore>,
    );

    bridge
        .login(LoginRequest {
            email: "jo@example.com".into(),
            password: "secret".into(),
        })
        .await
        .unwrap();

    bridge.logout().await.unwrap();

    assert!(bridge.session().snapshot().is_guest());
    assert!(
        store
            .get_item(&keys::cached_credentials())
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(api.invalidated_tokens(), vec!["tok".to_string()]);

    // A fresh process over the same store starts as guest.
    let next = bridge_with(MockAuthApi::default(), store);
    assert!(next.restore_on_startup().await.is_guest());
}
