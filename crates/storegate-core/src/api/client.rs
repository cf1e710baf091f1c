//! HTTP client for the storegate account REST API.
//!
//! `ApiClient` implements [`AuthApi`] on top of `reqwest`. Every request
//! and response body is JSON. Failures are mapped to [`ApiError`] by status
//! code and never retried.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::models::{Account, AccountId, AuthResponse};

use super::{ApiError, AuthApi};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct ActivationRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Serialize)]
struct ResetPasswordRequest<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct ChangePasswordRequest<'a> {
    token: &'a str,
    password: &'a str,
}

/// API client for the account backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self::with_client(client, base_url))
    }

    /// Wrap an existing `reqwest::Client`, sharing its connection pool
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: Method, path: &str, bearer: Option<&str>) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, self.url(path))
            .header(header::ACCEPT, "application/json");
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send().await?;
        debug!(status = %response.status(), url = %response.url(), "Response received");
        Self::check_response(response).await
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let status = response.status().as_u16();
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::InvalidResponse {
            status: Some(status),
            message: format!("Failed to parse response body: {}", e),
        })
    }

    async fn post_json<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        bearer: Option<&str>,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .send(self.request(Method::POST, path, bearer).json(body))
            .await?;
        Self::parse(response).await
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn register(&self, email: &str, password: &str) -> Result<Account, ApiError> {
        self.post_json("/registration", None, &Credentials { email, password })
            .await
    }

    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        self.post_json("/login", None, &Credentials { email, password })
            .await
    }

    async fn activate(&self, token: &str) -> Result<AuthResponse, ApiError> {
        self.post_json("/activation", None, &ActivationRequest { token })
            .await
    }

    async fn profile(&self, bearer: Option<&str>) -> Result<Account, ApiError> {
        let response = self
            .send(self.request(Method::GET, "/profile", bearer))
            .await?;
        Self::parse(response).await
    }

    async fn reset_password(&self, bearer: Option<&str>, email: &str) -> Result<(), ApiError> {
        self.send(
            self.request(Method::POST, "/reset_password", bearer)
                .json(&ResetPasswordRequest { email }),
        )
        .await?;
        Ok(())
    }

    async fn change_password(
        &self,
        bearer: Option<&str>,
        token: &str,
        password: &str,
    ) -> Result<AuthResponse, ApiError> {
        self.post_json(
            "/change_password",
            bearer,
            &ChangePasswordRequest { token, password },
        )
        .await
    }

    async fn delete_user(&self, bearer: Option<&str>, id: &AccountId) -> Result<(), ApiError> {
        let path = format!("/users/{}", id);
        self.send(self.request(Method::DELETE, &path, bearer)).await?;
        Ok(())
    }
}
