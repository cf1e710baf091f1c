//! REST API client module for the storegate account backend.
//!
//! `AuthApi` is the seam the session store talks through; `ApiClient` is
//! its HTTP implementation. Authenticated endpoints take a JWT bearer
//! token issued by login, activation, or password change.

pub mod auth;
pub mod client;
pub mod error;

pub use auth::AuthApi;
pub use client::ApiClient;
pub use error::ApiError;
