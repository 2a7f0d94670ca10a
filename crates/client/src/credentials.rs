//! Persisted bearer credentials.
//!
//! The backend issues a short-lived access token and a longer-lived refresh
//! token as a pair. At most one valid pair exists per device at a time;
//! storing a new pair replaces the old one in a single write, so callers
//! never observe a partial pair.
//!
//! On the device, the pair lives in the platform's secure key-value store.
//! [`CredentialStore`] abstracts that store; [`FileCredentialStore`] is the
//! JSON-file stand-in used off-device and [`MemoryCredentialStore`] backs
//! tests and ephemeral sessions.

use std::path::PathBuf;
use std::sync::RwLock;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// An access/refresh token pair with the time it was obtained.
#[derive(Clone)]
pub struct StoredCredentials {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    /// Unix timestamp of when the pair was issued to this device.
    pub obtained_at: i64,
}

impl StoredCredentials {
    /// Wrap a freshly issued token pair, stamping it with the current time.
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: SecretString::from(refresh_token.into()),
            obtained_at: chrono::Utc::now().timestamp(),
        }
    }
}

impl std::fmt::Debug for StoredCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredCredentials")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}

/// Persisted mirror of [`StoredCredentials`]. Kept private so secrets only
/// leave [`SecretString`] at the serialization boundary.
#[derive(Serialize, Deserialize)]
struct PersistedCredentials {
    access_token: String,
    refresh_token: String,
    obtained_at: i64,
}

impl From<&StoredCredentials> for PersistedCredentials {
    fn from(creds: &StoredCredentials) -> Self {
        Self {
            access_token: creds.access_token.expose_secret().to_string(),
            refresh_token: creds.refresh_token.expose_secret().to_string(),
            obtained_at: creds.obtained_at,
        }
    }
}

impl From<PersistedCredentials> for StoredCredentials {
    fn from(persisted: PersistedCredentials) -> Self {
        Self {
            access_token: SecretString::from(persisted.access_token),
            refresh_token: SecretString::from(persisted.refresh_token),
            obtained_at: persisted.obtained_at,
        }
    }
}

/// Abstraction over the device's secure credential store.
///
/// Implementations must be fast and local; the transport reads the access
/// token on every request.
pub trait CredentialStore: Send + Sync {
    /// Load the stored pair, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn load(&self) -> Result<Option<StoredCredentials>, StorageError>;

    /// Replace the stored pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn store(&self, credentials: &StoredCredentials) -> Result<(), StorageError>;

    /// Delete both tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn clear(&self) -> Result<(), StorageError>;
}

/// In-memory credential store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryCredentialStore {
    credentials: RwLock<Option<StoredCredentials>>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with a pair. Convenient in tests.
    #[must_use]
    pub fn with_credentials(credentials: StoredCredentials) -> Self {
        Self {
            credentials: RwLock::new(Some(credentials)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<StoredCredentials>, StorageError> {
        let guard = self
            .credentials
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(guard.clone())
    }

    fn store(&self, credentials: &StoredCredentials) -> Result<(), StorageError> {
        let mut guard = self
            .credentials
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = Some(credentials.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut guard = self
            .credentials
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = None;
        Ok(())
    }
}

/// JSON-file credential store.
///
/// Stands in for the device secure store when running off-device (CLI tools,
/// local development). Writes go through a temp file and rename so a crash
/// never leaves a half-written pair behind.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Create a store backed by the given file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<StoredCredentials>, StorageError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let persisted: PersistedCredentials = serde_json::from_str(&raw)?;
        Ok(Some(persisted.into()))
    }

    fn store(&self, credentials: &StoredCredentials) -> Result<(), StorageError> {
        let payload = serde_json::to_string(&PersistedCredentials::from(credentials))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, payload)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
