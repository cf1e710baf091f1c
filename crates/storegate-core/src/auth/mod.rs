//! Authentication module for managing user sessions and tokens.
//!
//! This module provides:
//! - `SessionStore`: observable account/token/loading state driven by the auth API
//! - `SessionTokenStore`: durable token persistence, with memory, file and
//!   OS keychain backends
//!
//! The persisted token lives under a single entry named `auth-token`.

pub mod file;
pub mod keychain;
pub mod store;
pub mod token;

pub use file::{FileTokenStore, StoredToken};
pub use keychain::KeyringTokenStore;
pub use store::SessionStore;
pub use token::{MemoryTokenStore, SessionTokenStore, TOKEN_ENTRY};
