//! Authentication API collaborators.

pub mod auth;
pub mod client;

pub use auth::{AuthApi, AuthPayload, HttpAuthApi, LoginRequest, RegisterRequest};
pub use client::ApiClient;
