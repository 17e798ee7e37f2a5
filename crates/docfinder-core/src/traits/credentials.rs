//! Credential supplier trait for the real-time handshake.

use async_trait::async_trait;

/// Asynchronous supplier of the current access token.
///
/// The real-time transport calls this while establishing an authenticated
/// connection so the token is fetched at handshake time, not captured at
/// connection-manager construction time. Returning `None` yields an
/// unauthenticated handshake.
#[async_trait]
pub trait CredentialSource: Send + Sync + std::fmt::Debug + 'static {
    /// The access token to present during the handshake, if any.
    async fn access_token(&self) -> Option<String>;
}

/// A fixed token, mainly useful in tests and one-off tools.
#[derive(Debug, Clone)]
pub struct StaticCredentialSource {
    token: String,
}

impl StaticCredentialSource {
    /// Wrap a literal access token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialSource for StaticCredentialSource {
    async fn access_token(&self) -> Option<String> {
        Some(self.token.clone())
    }
}
