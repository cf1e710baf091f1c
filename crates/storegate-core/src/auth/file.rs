use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::token::{SessionTokenStore, TOKEN_ENTRY};

/// Session file name in the session directory
const SESSION_FILE: &str = "session.json";

/// On-disk form of the persisted session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    #[serde(rename = "auth-token")]
    pub token: String,
    pub saved_at: DateTime<Utc>,
}

impl StoredToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            saved_at: Utc::now(),
        }
    }

    /// Minutes since the token was written (for display)
    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.saved_at).num_minutes().max(0)
    }
}

/// Token store backed by a JSON file, e.g. `~/.cache/storegate/session.json`
///
/// Reads and writes use blocking `std::fs` calls. The session store calls
/// them inline from its async operations; the file is a few dozen bytes,
/// written once per login, so it does not go through `spawn_blocking`.
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    /// Load the stored record from disk, if any
    pub fn load(&self) -> Result<Option<StoredToken>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read session file")?;
        let stored: StoredToken =
            serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(stored))
    }

    /// Save a token to disk
    pub fn save(&self, token: &str) -> Result<()> {
        let path = self.path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(&StoredToken::new(token))?;
        write_private(&path, &contents).context("Failed to write session file")?;
        Ok(())
    }

    /// Delete the session file
    pub fn clear(&self) -> Result<()> {
        let path = self.path();
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &str) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies on creation; tighten files left by older versions
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(contents.as_bytes())
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &str) -> std::io::Result<()> {
    std::fs::write(path, contents)
}

impl SessionTokenStore for FileTokenStore {
    fn get(&self) -> Option<String> {
        match self.load() {
            Ok(stored) => stored.map(|s| s.token),
            Err(e) => {
                warn!(error = %e, entry = TOKEN_ENTRY, "Ignoring unreadable session file");
                None
            }
        }
    }

    fn set(&self, token: &str) {
        match self.save(token) {
            Ok(()) => debug!(path = %self.path().display(), "Session token saved"),
            Err(e) => warn!(error = %e, "Failed to save session token"),
        }
    }

    fn remove(&self) {
        if let Err(e) = self.clear() {
            warn!(error = %e, "Failed to remove session token");
        }
    }
}
