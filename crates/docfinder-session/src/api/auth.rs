//! Authentication API trait and its HTTP implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use docfinder_core::result::AppResult;
use docfinder_core::types::{Credentials, UserProfile};

use super::client::ApiClient;

/// Login request payload.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    /// Login identifier (email address).
    pub email: String,
    /// Plaintext password, sent over the transport only.
    pub password: String,
}

/// Registration request payload.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    /// Login identifier (email address).
    pub email: String,
    /// Display name.
    pub display_name: String,
    /// Plaintext password, sent over the transport only.
    pub password: String,
}

/// Result of a successful credential exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthPayload {
    /// The authenticated user.
    pub user: UserProfile,
    /// Generated credential pair.
    pub credentials: Credentials,
}

/// External authentication collaborator.
///
/// `profile` exchanges an access token for a validated user profile;
/// `invalidate` is the best-effort server-side session invalidation whose
/// failure never blocks a local logout.
#[async_trait]
pub trait AuthApi: Send + Sync + std::fmt::Debug + 'static {
    /// Exchange login credentials for a user and credential pair.
    async fn login(&self, request: &LoginRequest) -> AppResult<AuthPayload>;

    /// Register a new account, returning the user and credential pair.
    async fn register(&self, request: &RegisterRequest) -> AppResult<AuthPayload>;

    /// Exchange an access token for the validated user profile.
    async fn profile(&self, access_token: &str) -> AppResult<UserProfile>;

    /// Invalidate the server-side session for an access token.
    async fn invalidate(&self, access_token: &str) -> AppResult<()>;
}

/// [`AuthApi`] over the DocFinder HTTP API.
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    client: ApiClient,
}

impl HttpAuthApi {
    /// Create a new HTTP auth API from an API client.
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, request: &LoginRequest) -> AppResult<AuthPayload> {
        self.client.post("auth/login", request, None).await
    }

    async fn register(&self, request: &RegisterRequest) -> AppResult<AuthPayload> {
        self.client.post("auth/register", request, None).await
    }

    async fn profile(&self, access_token: &str) -> AppResult<UserProfile> {
        self.client.get("auth/me", Some(access_token)).await
    }

    async fn invalidate(&self, access_token: &str) -> AppResult<()> {
        self.client.post_empty("auth/logout", Some(access_token)).await
    }
}
