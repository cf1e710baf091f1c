//! storegate-core: account session management for the storegate dashboard.
//!
//! The heart of the crate is [`SessionStore`], which signs users up, logs
//! them in and out, manages passwords and keeps the session token in
//! durable storage. It talks to the backend through the [`AuthApi`] seam,
//! implemented over HTTP by [`ApiClient`].

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, AuthApi};
pub use auth::{
    FileTokenStore, KeyringTokenStore, MemoryTokenStore, SessionStore, SessionTokenStore,
    TOKEN_ENTRY,
};
pub use config::{Config, TokenBackend};
pub use models::{Account, AccountId, AuthResponse, SessionSnapshot};

/// Session store wired to the real backend and the configured token backend
pub type ClientSessionStore = SessionStore<ApiClient, Box<dyn SessionTokenStore>>;

/// Build a session store from configuration
pub fn connect(config: &Config) -> anyhow::Result<ClientSessionStore> {
    let api = ApiClient::new(config.api_base_url())?;
    let tokens = config.token_store()?;
    tracing::debug!(
        base_url = config.api_base_url(),
        backend = %config.token_backend,
        "Session store ready"
    );
    Ok(SessionStore::new(api, tokens))
}
