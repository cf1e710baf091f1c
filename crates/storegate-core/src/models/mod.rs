//! Data models for storegate accounts and sessions.
//!
//! - `Account`: identity record returned by the backend
//! - `AuthResponse`: token + account body of login-style endpoints
//! - `SessionSnapshot`: observable copy of the session store state

pub mod account;
pub mod session;

pub use account::{Account, AccountId, AuthResponse};
pub use session::SessionSnapshot;
