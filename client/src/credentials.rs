//! # Credential Store
//!
//! The stream client reads its auth token through [`CredentialStore`] once
//! per connection attempt, never caching it, so a token refreshed between
//! reconnects is picked up by the next attempt.
//!
//! [`TokenStorage`] keeps the JWT in a single file, the native analogue of
//! the browser's `jwt_token` local-storage slot.

use crate::error::CredentialError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Read-only access to the current auth token.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Option<String>;
}

impl<F> CredentialStore for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn get(&self) -> Option<String> {
        self()
    }
}

/// A credential fixed for the lifetime of the process (e.g. `--token`).
#[derive(Debug, Clone, Default)]
pub struct StaticCredential(Option<String>);

impl StaticCredential {
    pub fn new(token: Option<String>) -> Self {
        Self(token)
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl CredentialStore for StaticCredential {
    fn get(&self) -> Option<String> {
        self.0.clone()
    }
}

// ─── File-backed Token Storage ──────────────────────────────────

#[derive(Debug, Clone)]
pub struct TokenStorage {
    path: PathBuf,
}

impl TokenStorage {
    pub const FILE_NAME: &'static str = "jwt_token";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/haifu/jwt_token`
    pub fn default_location() -> Result<Self, CredentialError> {
        let dir = dirs::config_dir().ok_or(CredentialError::NoConfigDir)?;
        Ok(Self::new(dir.join("haifu").join(Self::FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, token: &str) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        fs::write(&self.path, token.trim()).map_err(|e| self.io_error(e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))
                .map_err(|e| self.io_error(e))?;
        }

        Ok(())
    }

    /// Returns `Ok(None)` when no token has been saved.
    pub fn load(&self) -> Result<Option<String>, CredentialError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    pub fn remove(&self) -> Result<(), CredentialError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    pub fn has_token(&self) -> bool {
        self.get().is_some()
    }

    fn io_error(&self, source: io::Error) -> CredentialError {
        CredentialError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl CredentialStore for TokenStorage {
    fn get(&self) -> Option<String> {
        match self.load() {
            Ok(token) => token,
            Err(e) => {
                warn!("Failed to read stored token: {}", e);
                None
            }
        }
    }
}
