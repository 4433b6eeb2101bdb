//! Persisted auth cookie.
//!
//! The credential survives restarts as one `SPTF_AUTH` cookie per server
//! origin, stored as JSON in a [`CredentialBackend`] (the OS keychain by
//! default). Cookies are written with a far-future expiry; an expired cookie
//! reads back as absent.

pub mod keychain;

use std::time::{SystemTime, UNIX_EPOCH};

use protocol::http::AUTH_COOKIE_NAME;
use serde::{Deserialize, Serialize};
use url::Url;

pub use keychain::{
    CredentialBackend, MemoryBackend, StorageError, StorageResult, SystemKeychain, SERVICE_NAME,
};

/// 2200-02-01T00:00:00Z in Unix seconds.
pub const FAR_FUTURE_EXPIRY: u64 = 7_260_796_800;

/// The cookie as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    /// Serialized server origin, e.g. `https://host:8766`.
    pub origin: String,
    /// Unix seconds.
    pub expires_at: u64,
}

impl StoredCookie {
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expires_at <= now
    }
}

/// Cookie store scoped to one server origin.
pub struct CookieJar<B: CredentialBackend> {
    backend: B,
    origin: String,
}

impl<B: CredentialBackend> CookieJar<B> {
    /// Create a jar for the origin of `server`.
    pub fn new(backend: B, server: &Url) -> Self {
        Self {
            backend,
            origin: server.origin().ascii_serialization(),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    fn entry_key(&self) -> String {
        format!("{}@{}", AUTH_COOKIE_NAME, self.origin)
    }

    /// Read the stored cookie.
    ///
    /// Missing, expired, foreign-origin and unreadable entries all read as
    /// `None`; expired and unreadable ones are removed.
    pub fn get_cookie(&self) -> StorageResult<Option<StoredCookie>> {
        let key = self.entry_key();
        let raw = match self.backend.get_secret(SERVICE_NAME, &key) {
            Ok(raw) => raw,
            Err(StorageError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let cookie: StoredCookie = match serde_json::from_str(&raw) {
            Ok(cookie) => cookie,
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable stored cookie");
                self.remove_cookie()?;
                return Ok(None);
            }
        };

        if cookie.origin != self.origin || cookie.name != AUTH_COOKIE_NAME {
            tracing::warn!(origin = %cookie.origin, "stored cookie belongs to another origin");
            return Ok(None);
        }

        if cookie.is_expired_at(unix_now()) {
            tracing::debug!(expires_at = cookie.expires_at, "stored cookie expired");
            self.remove_cookie()?;
            return Ok(None);
        }

        Ok(Some(cookie))
    }

    /// Token of the stored cookie, if one is usable.
    pub fn get_token(&self) -> StorageResult<Option<String>> {
        Ok(self.get_cookie()?.map(|c| c.value))
    }

    /// Persist `token` with the far-future expiry.
    pub fn set_cookie(&self, token: &str) -> StorageResult<StoredCookie> {
        self.set_cookie_expiring(token, FAR_FUTURE_EXPIRY)
    }

    /// Persist `token` with an explicit expiry.
    pub fn set_cookie_expiring(&self, token: &str, expires_at: u64) -> StorageResult<StoredCookie> {
        let cookie = StoredCookie {
            name: AUTH_COOKIE_NAME.to_string(),
            value: token.to_string(),
            origin: self.origin.clone(),
            expires_at,
        };
        let raw =
            serde_json::to_string(&cookie).map_err(|e| StorageError::Encoding(e.to_string()))?;
        self.backend.set_secret(SERVICE_NAME, &self.entry_key(), &raw)?;
        tracing::debug!(origin = %self.origin, "auth cookie stored");
        Ok(cookie)
    }

    /// Remove the stored cookie. Removing an absent cookie succeeds.
    pub fn remove_cookie(&self) -> StorageResult<()> {
        match self.backend.delete_secret(SERVICE_NAME, &self.entry_key()) {
            Ok(()) | Err(StorageError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
