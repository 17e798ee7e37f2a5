//! Thin HTTP client over reqwest.
//!
//! Failures never escape as raw reqwest errors: every response outside the
//! 2xx range is parsed into the API's structured error body (a `detail`
//! message plus optional per-field messages) and mapped into [`AppError`].

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use docfinder_core::config::api::ApiConfig;
use docfinder_core::error::{AppError, ErrorKind};
use docfinder_core::result::AppResult;

/// Structured error body returned by the DocFinder API.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    /// Top-level human-readable message.
    #[serde(default)]
    pub detail: String,
    /// Per-field error messages.
    #[serde(default)]
    pub errors: BTreeMap<String, Vec<String>>,
}

/// HTTP client for the DocFinder API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client from configuration.
    pub fn new(config: &ApiConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Configuration,
                    "Failed to build HTTP client",
                    e,
                )
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET `path` and deserialize the JSON response.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        bearer: Option<&str>,
    ) -> AppResult<T> {
        self.send(self.http.get(self.url(path)), bearer).await
    }

    /// POST a JSON `body` to `path` and deserialize the JSON response.
    pub async fn post<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        bearer: Option<&str>,
    ) -> AppResult<T> {
        self.send(self.http.post(self.url(path)).json(body), bearer)
            .await
    }

    /// POST to `path` without a body, ignoring the response body.
    pub async fn post_empty(&self, path: &str, bearer: Option<&str>) -> AppResult<()> {
        let builder = self.http.post(self.url(path));
        let response = self
            .authorize(builder, bearer)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(error_from_response(status, response).await)
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        bearer: Option<&str>,
    ) -> AppResult<T> {
        let response = self
            .authorize(builder, bearer)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if status.is_success() {
            response.json::<T>().await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Serialization,
                    format!("Failed to decode API response: {e}"),
                    e,
                )
            })
        } else {
            Err(error_from_response(status, response).await)
        }
    }

    fn authorize(&self, builder: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
        match bearer {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

/// Map a reqwest send failure into the client error taxonomy.
fn map_send_error(err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::with_source(ErrorKind::Timeout, "API request timed out", err)
    } else {
        AppError::with_source(
            ErrorKind::ExternalService,
            format!("API request failed: {err}"),
            err,
        )
    }
}

/// Build an [`AppError`] from a non-success response, preserving the
/// structured `detail` and per-field messages when the body carries them.
async fn error_from_response(status: StatusCode, response: reqwest::Response) -> AppError {
    let body = response.json::<ErrorBody>().await.unwrap_or_default();

    let kind = if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        ErrorKind::Authentication
    } else if status == StatusCode::BAD_REQUEST
        || status == StatusCode::UNPROCESSABLE_ENTITY
        || status == StatusCode::CONFLICT
    {
        ErrorKind::Validation
    } else {
        ErrorKind::ExternalService
    };

    let detail = if body.detail.is_empty() {
        format!("API request failed with status {status}")
    } else {
        body.detail
    };

    AppError::new(kind, detail).with_field_errors(body.errors)
}
