use async_trait::async_trait;

use crate::models::{Account, AccountId, AuthResponse};

use super::ApiError;

/// Remote authentication API consumed by the session store.
///
/// `ApiClient` talks to the real backend over HTTP; tests plug in
/// in-memory doubles. Bearer-authenticated calls receive the token the
/// store currently holds, or `None` when there is no session.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// `POST /registration`
    async fn register(&self, email: &str, password: &str) -> Result<Account, ApiError>;

    /// `POST /login`
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError>;

    /// `POST /activation`
    async fn activate(&self, token: &str) -> Result<AuthResponse, ApiError>;

    /// `GET /profile`
    async fn profile(&self, bearer: Option<&str>) -> Result<Account, ApiError>;

    /// `POST /reset_password`
    async fn reset_password(&self, bearer: Option<&str>, email: &str) -> Result<(), ApiError>;

    /// `POST /change_password`
    async fn change_password(
        &self,
        bearer: Option<&str>,
        token: &str,
        password: &str,
    ) -> Result<AuthResponse, ApiError>;

    /// `DELETE /users/{id}`
    async fn delete_user(&self, bearer: Option<&str>, id: &AccountId) -> Result<(), ApiError>;
}
