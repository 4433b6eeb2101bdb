//! Credential Gateway: login, signup, logout and cookie revalidation.

use protocol::http::{
    LoginRequest, LoginResponse, LOGIN_PATH, LOGIN_WITH_COOKIE_PATH, LOGOUT_PATH, SIGNUP_PATH,
};
use protocol::ErrorCategory;
use reqwest::header::COOKIE;

use crate::api::{interpret_parts, ApiClient};
use crate::credential::{Credential, CredentialOrigin};
use crate::error::{ClientError, ClientResult};

/// Exchanges user secrets for credentials over the request/reply API.
#[derive(Debug, Clone)]
pub struct CredentialGateway {
    api: ApiClient,
}

fn validate_login_fields(username: &str, password: &str) -> ClientResult<()> {
    if username.trim().is_empty() {
        return Err(ClientError::Validation("username is empty".to_string()));
    }
    if password.is_empty() {
        return Err(ClientError::Validation("password is empty".to_string()));
    }
    Ok(())
}

impl CredentialGateway {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Log in with a username and password.
    ///
    /// Empty fields fail with `Validation` before any I/O.
    pub async fn login(&self, username: &str, password: &str) -> ClientResult<Credential> {
        validate_login_fields(username, password)?;

        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let reply = self.api.post_json(LOGIN_PATH, &body, None).await?;
        let login: LoginResponse = serde_json::from_slice(&reply)
            .map_err(|e| ClientError::Protocol(format!("malformed login reply: {}", e)))?;

        tracing::info!(username, "logged in");
        Ok(Credential::new(login.auth_token, CredentialOrigin::Login))
    }

    /// Register a new account. Does not log in.
    pub async fn signup(&self, username: &str, password: &str) -> ClientResult<()> {
        validate_login_fields(username, password)?;

        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        self.api.post_json(SIGNUP_PATH, &body, None).await?;
        tracing::info!(username, "account created");
        Ok(())
    }

    /// Invalidate the credential on the server.
    ///
    /// Callers discard the credential whatever the outcome.
    pub async fn logout(&self, credential: &Credential) -> ClientResult<()> {
        self.api.post_empty(LOGOUT_PATH, credential).await?;
        tracing::info!("logged out");
        Ok(())
    }

    /// Ask the server whether a stored token is still valid.
    ///
    /// `Ok(false)` only when the server says the token is expired, invalid or
    /// unknown. Server faults and unreachable servers are `Err`.
    pub async fn login_with_cookie(&self, token: &str) -> ClientResult<bool> {
        let request = self
            .api
            .http()
            .post(self.api.endpoint(LOGIN_WITH_COOKIE_PATH)?)
            .header(COOKIE, protocol::http::auth_cookie(token));

        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        match interpret_parts(status, &body) {
            Ok(()) => {
                tracing::info!("stored credential revalidated");
                Ok(true)
            }
            Err(e) if rejects_token(&e) => {
                tracing::info!(status, error = %e, "stored credential rejected");
                Ok(false)
            }
            Err(e) => {
                tracing::warn!(status, error = %e, "could not revalidate stored credential");
                Err(e)
            }
        }
    }
}

/// Whether a revalidation failure says the token itself is bad.
fn rejects_token(error: &ClientError) -> bool {
    matches!(
        error,
        ClientError::Server(
            ErrorCategory::CookieExpired
                | ErrorCategory::CookieInvalid
                | ErrorCategory::InvalidCredentials(_)
        )
    )
}
