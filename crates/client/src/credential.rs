//! The bearer credential.

use std::fmt;

/// How a credential was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CredentialOrigin {
    /// Interactive username/password login.
    Login,
    /// A stored cookie the server revalidated.
    Cookie,
}

/// Opaque auth token plus where it came from.
///
/// `Debug` never prints the token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    origin: CredentialOrigin,
}

impl Credential {
    pub fn new(token: impl Into<String>, origin: CredentialOrigin) -> Self {
        Self {
            token: token.into(),
            origin,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn origin(&self) -> CredentialOrigin {
        self.origin
    }

    /// `Cookie` header value carrying this credential.
    pub fn cookie_header(&self) -> String {
        protocol::http::auth_cookie(&self.token)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("origin", &self.origin)
            .finish()
    }
}
