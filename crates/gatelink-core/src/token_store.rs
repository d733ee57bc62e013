//! Auth-token persistence.
//!
//! The store holds the single authoritative copy of the device token.
//! The manager only ever keeps a transient copy for the duration of a
//! bootstrap or session construction.

use std::path::PathBuf;
use std::sync::Mutex;

use secrecy::{ExposeSecret, SecretString};

use crate::error::CoreError;

/// Persistent storage for the opaque device bearer token.
///
/// Implementations use interior mutability — the manager holds the store
/// behind an `Arc` and calls through `&self`.
pub trait TokenStore: Send + Sync {
    /// Whether a token is currently stored.
    fn has(&self) -> bool {
        self.get().is_some()
    }

    /// Retrieve the stored token, if any.
    fn get(&self) -> Option<SecretString>;

    /// Persist a new token, replacing any existing one.
    fn set(&self, token: SecretString) -> Result<(), CoreError>;

    /// Remove the stored token. Clearing an empty store is not an error.
    fn clear(&self) -> Result<(), CoreError>;
}

// ── In-memory store ──────────────────────────────────────────────────

/// Volatile store, for tests and hosts that persist elsewhere.
#[derive(Default)]
pub struct MemoryTokenStore {
    inner: Mutex<Option<SecretString>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<SecretString> {
        self.inner
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|t| SecretString::from(t.expose_secret().to_owned())))
    }

    fn set(&self, token: SecretString) -> Result<(), CoreError> {
        let mut guard = self.inner.lock().map_err(|_| CoreError::TokenStore {
            message: "token store lock poisoned".into(),
        })?;
        *guard = Some(token);
        Ok(())
    }

    fn clear(&self) -> Result<(), CoreError> {
        let mut guard = self.inner.lock().map_err(|_| CoreError::TokenStore {
            message: "token store lock poisoned".into(),
        })?;
        *guard = None;
        Ok(())
    }
}

// ── File-backed store ────────────────────────────────────────────────

/// Token persisted as a single file, the way constrained devices keep it
/// on flash.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Option<SecretString> {
        let contents = std::fs::read_to_string(&self.path).ok()?;
        let token = contents.trim();
        if token.is_empty() {
            return None;
        }
        Some(SecretString::from(token.to_owned()))
    }

    fn set(&self, token: SecretString) -> Result<(), CoreError> {
        std::fs::write(&self.path, token.expose_secret()).map_err(|e| CoreError::TokenStore {
            message: format!("failed to write {}: {e}", self.path.display()),
        })
    }

    fn clear(&self) -> Result<(), CoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::TokenStore {
                message: format!("failed to remove {}: {e}", self.path.display()),
            }),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
