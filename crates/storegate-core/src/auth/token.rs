use std::sync::Mutex;

/// Name of the durable entry holding the session token
pub const TOKEN_ENTRY: &str = "auth-token";

/// Durable storage for the session token.
///
/// Implementations never fail outward: reading an unavailable store yields
/// `None`, and write/remove errors are logged by the backend.
///
/// Methods are synchronous and `SessionStore` calls them inline from its
/// async operations, so backends must stay cheap (a small file, one
/// keychain entry).
pub trait SessionTokenStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, token: &str);
    fn remove(&self);
}

/// Process-local token store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl SessionTokenStore for MemoryTokenStore {
    fn get(&self) -> Option<String> {
        self.token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set(&self, token: &str) {
        *self
            .token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(token.to_string());
    }

    fn remove(&self) {
        self.token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
    }
}

impl<T: SessionTokenStore + ?Sized> SessionTokenStore for std::sync::Arc<T> {
    fn get(&self) -> Option<String> {
        (**self).get()
    }

    fn set(&self, token: &str) {
        (**self).set(token)
    }

    fn remove(&self) {
        (**self).remove()
    }
}

impl<T: SessionTokenStore + ?Sized> SessionTokenStore for Box<T> {
    fn get(&self) -> Option<String> {
        (**self).get()
    }

    fn set(&self, token: &str) {
        (**self).set(token)
    }

    fn remove(&self) {
        (**self).remove()
    }
}
