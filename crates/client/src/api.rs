//! Shared plumbing for the request/reply API.
//!
//! Every call is a POST (or GET for downloads) against the configured server
//! origin. Responses are interpreted with one rule: 2xx is success; a 500
//! whose JSON body carries an integer `errorCode` is classified; everything
//! else is [`ClientError::Unknown`].

use bytes::Bytes;
use protocol::http::{ErrorBody, STRUCTURED_ERROR_STATUS};
use reqwest::header::{CONTENT_TYPE, COOKIE};
use serde::Serialize;
use url::Url;

use crate::config::ClientConfig;
use crate::credential::Credential;
use crate::error::{ClientError, ClientResult};

/// HTTP client bound to one server.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let base = config.server_url()?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("sptf-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;
        Ok(Self { http, base })
    }

    /// The server base URL.
    pub fn base(&self) -> &Url {
        &self.base
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Absolute URL of an endpoint path.
    pub fn endpoint(&self, path: &str) -> ClientResult<Url> {
        self.base
            .join(path)
            .map_err(|e| ClientError::Validation(format!("bad endpoint {}: {}", path, e)))
    }

    /// POST a JSON body and interpret the reply.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
        credential: Option<&Credential>,
    ) -> ClientResult<Bytes> {
        let mut request = self.http.post(self.endpoint(path)?).json(body);
        if let Some(credential) = credential {
            request = request.header(COOKIE, credential.cookie_header());
        }
        tracing::debug!(path, "POST");
        interpret(request.send().await?).await
    }

    /// POST with only the auth cookie.
    pub async fn post_empty(&self, path: &str, credential: &Credential) -> ClientResult<Bytes> {
        let request = self
            .http
            .post(self.endpoint(path)?)
            .header(COOKIE, credential.cookie_header());
        tracing::debug!(path, "POST");
        interpret(request.send().await?).await
    }

    /// POST a MessagePack body with the auth cookie.
    pub async fn post_msgpack(
        &self,
        path: &str,
        body: Vec<u8>,
        credential: &Credential,
    ) -> ClientResult<Bytes> {
        let request = self
            .http
            .post(self.endpoint(path)?)
            .header(COOKIE, credential.cookie_header())
            .header(CONTENT_TYPE, "application/msgpack")
            .body(body);
        tracing::debug!(path, "POST msgpack");
        interpret(request.send().await?).await
    }
}

/// Read a response fully and apply the interpretation rule.
pub async fn interpret(response: reqwest::Response) -> ClientResult<Bytes> {
    let status = response.status().as_u16();
    let body = response.bytes().await?;
    interpret_parts(status, &body)?;
    Ok(body)
}

/// Interpretation rule on an already-read response.
pub fn interpret_parts(status: u16, body: &[u8]) -> ClientResult<()> {
    if (200..300).contains(&status) {
        return Ok(());
    }

    if status == STRUCTURED_ERROR_STATUS {
        if let Ok(error) = serde_json::from_slice::<ErrorBody>(body) {
            let category = protocol::classify_field(error.error_code.as_ref());
            tracing::debug!(status, ?category, "server reported error");
            return Err(ClientError::from_category(category));
        }
    }

    tracing::debug!(status, "unstructured server error");
    Err(ClientError::Unknown(format!("HTTP status {}", status)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{CredentialFault, ErrorCategory};

    #[test]
    fn test_success_statuses() {
        assert!(interpret_parts(200, b"").is_ok());
        assert!(interpret_parts(204, b"garbage").is_ok());
        assert!(interpret_parts(299, b"").is_ok());
    }

    #[test]
    fn test_structured_error() {
        let err = interpret_parts(500, br#"{"errorCode":2}"#).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Server(ErrorCategory::InvalidCredentials(
                CredentialFault::WrongPassword
            ))
        ));

        let err = interpret_parts(500, br#"{"errorCode":0}"#).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Server(ErrorCategory::InternalServerError)
        ));
    }

    #[test]
    fn test_unstructured_errors_are_unknown() {
        // error body on a status other than 500
        assert!(matches!(
            interpret_parts(400, br#"{"errorCode":2}"#),
            Err(ClientError::Unknown(_))
        ));
        assert!(matches!(
            interpret_parts(500, b"<html>oops</html>"),
            Err(ClientError::Unknown(_))
        ));
        assert!(matches!(
            interpret_parts(500, br#"{"errorCode":"2"}"#),
            Err(ClientError::Unknown(_))
        ));
        assert!(matches!(
            interpret_parts(500, br#"{"other":1}"#),
            Err(ClientError::Unknown(_))
        ));
        assert!(matches!(
            interpret_parts(500, br#"{"errorCode":77}"#),
            Err(ClientError::Unknown(_))
        ));
        assert!(matches!(interpret_parts(302, b""), Err(ClientError::Unknown(_))));
    }

    #[test]
    fn test_endpoint_join() {
        let api = ApiClient::new(&ClientConfig::with_server_url("https://h.example.com:8766"))
            .unwrap();
        assert_eq!(
            api.endpoint("/login").unwrap().as_str(),
            "https://h.example.com:8766/login"
        );
    }
}
