//! Keychain integration for secure storage of the auth cookie.
//!
//! This module provides cross-platform keychain access using the `keyring` crate:
//! - macOS: Keychain
//! - Windows: Credential Manager
//! - Linux: Secret Service (via D-Bus)

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;

/// The service name used for keychain entries.
pub const SERVICE_NAME: &str = "sptf";

/// Errors that can occur during credential storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested entry was not found.
    #[error("entry not found in keychain: {0}")]
    NotFound(String),

    /// Access to the keychain was denied.
    #[error("keychain access denied: {0}")]
    AccessDenied(String),

    /// The keychain service is unavailable.
    #[error("keychain service unavailable: {0}")]
    ServiceUnavailable(String),

    /// A stored value could not be encoded or decoded.
    #[error("stored value encoding error: {0}")]
    Encoding(String),

    /// A platform-specific keychain error occurred.
    #[error("keychain error: {0}")]
    Platform(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for credential backend implementations.
///
/// This trait allows for different storage implementations, including
/// an in-memory backend for tests and headless use.
pub trait CredentialBackend: Send + Sync {
    /// Retrieve a secret.
    fn get_secret(&self, service: &str, key: &str) -> StorageResult<String>;

    /// Store a secret, replacing any previous value.
    fn set_secret(&self, service: &str, key: &str, value: &str) -> StorageResult<()>;

    /// Delete a secret.
    fn delete_secret(&self, service: &str, key: &str) -> StorageResult<()>;
}

impl<B: CredentialBackend + ?Sized> CredentialBackend for Arc<B> {
    fn get_secret(&self, service: &str, key: &str) -> StorageResult<String> {
        (**self).get_secret(service, key)
    }

    fn set_secret(&self, service: &str, key: &str, value: &str) -> StorageResult<()> {
        (**self).set_secret(service, key, value)
    }

    fn delete_secret(&self, service: &str, key: &str) -> StorageResult<()> {
        (**self).delete_secret(service, key)
    }
}

/// Backend using the system keychain.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemKeychain;

fn map_keyring_error(key: &str, err: keyring::Error) -> StorageError {
    match err {
        keyring::Error::NoEntry => StorageError::NotFound(key.to_string()),
        keyring::Error::Ambiguous(_) => {
            StorageError::Platform("ambiguous keychain entry".to_string())
        }
        keyring::Error::TooLong(_, _) => StorageError::Encoding("value too long".to_string()),
        keyring::Error::Invalid(_, _) => StorageError::Encoding("invalid entry format".to_string()),
        keyring::Error::BadEncoding(_) => {
            StorageError::Encoding("stored value is not valid UTF-8".to_string())
        }
        keyring::Error::NoStorageAccess(_) => {
            StorageError::AccessDenied("no storage access".to_string())
        }
        keyring::Error::PlatformFailure(_) => {
            StorageError::ServiceUnavailable("platform failure".to_string())
        }
        other => StorageError::Platform(other.to_string()),
    }
}

impl CredentialBackend for SystemKeychain {
    fn get_secret(&self, service: &str, key: &str) -> StorageResult<String> {
        let entry =
            keyring::Entry::new(service, key).map_err(|e| map_keyring_error(key, e))?;
        entry.get_password().map_err(|e| map_keyring_error(key, e))
    }

    fn set_secret(&self, service: &str, key: &str, value: &str) -> StorageResult<()> {
        let entry =
            keyring::Entry::new(service, key).map_err(|e| map_keyring_error(key, e))?;
        entry.set_password(value).map_err(|e| map_keyring_error(key, e))
    }

    fn delete_secret(&self, service: &str, key: &str) -> StorageResult<()> {
        let entry =
            keyring::Entry::new(service, key).map_err(|e| map_keyring_error(key, e))?;
        entry
            .delete_credential()
            .map_err(|e| map_keyring_error(key, e))
    }
}

/// In-memory backend. Contents are lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    storage: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn make_key(service: &str, key: &str) -> String {
        format!("{}:{}", service, key)
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.storage
            .lock()
            .map_err(|_| StorageError::Platform("memory backend poisoned".to_string()))
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CredentialBackend for MemoryBackend {
    fn get_secret(&self, service: &str, key: &str) -> StorageResult<String> {
        self.lock()?
            .get(&Self::make_key(service, key))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn set_secret(&self, service: &str, key: &str, value: &str) -> StorageResult<()> {
        self.lock()?
            .insert(Self::make_key(service, key), value.to_string());
        Ok(())
    }

    fn delete_secret(&self, service: &str, key: &str) -> StorageResult<()> {
        match self.lock()?.remove(&Self::make_key(service, key)) {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound(key.to_string())),
        }
    }
}
