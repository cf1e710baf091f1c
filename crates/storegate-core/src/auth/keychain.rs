use anyhow::{Context, Result};
use keyring::Entry;
use tracing::warn;

use super::token::{SessionTokenStore, TOKEN_ENTRY};

const SERVICE_NAME: &str = "storegate";

/// Token store backed by the OS keychain (macOS Keychain, Windows
/// Credential Manager, Linux kernel keyutils).
///
/// One keychain entry is opened up front and reused for every read and
/// write.
pub struct KeyringTokenStore {
    service: String,
    entry: Entry,
}

impl KeyringTokenStore {
    pub fn new() -> Result<Self> {
        Self::with_service(SERVICE_NAME)
    }

    /// Use a custom keychain service name (e.g. one per backend)
    pub fn with_service(service: impl Into<String>) -> Result<Self> {
        let service = service.into();
        let entry = Entry::new(&service, TOKEN_ENTRY).context("Failed to create keyring entry")?;
        Ok(Self { service, entry })
    }

    /// Read the token, distinguishing "no entry" from keychain failures
    pub fn load(&self) -> Result<Option<String>> {
        match self.entry.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve token from keychain"),
        }
    }

    /// Store the token in the OS keychain
    pub fn store(&self, token: &str) -> Result<()> {
        self.entry
            .set_password(token)
            .context("Failed to store token in keychain")
    }

    /// Delete the stored token
    pub fn delete(&self) -> Result<()> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}

impl SessionTokenStore for KeyringTokenStore {
    fn get(&self) -> Option<String> {
        self.load().unwrap_or_else(|e| {
            warn!(error = %e, service = %self.service, "Keychain read failed");
            None
        })
    }

    fn set(&self, token: &str) {
        if let Err(e) = self.store(token) {
            warn!(error = %e, service = %self.service, "Keychain write failed");
        }
    }

    fn remove(&self) {
        if let Err(e) = self.delete() {
            warn!(error = %e, service = %self.service, "Keychain delete failed");
        }
    }
}
