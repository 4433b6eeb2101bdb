//! Request/reply payloads for a UI process talking to the host.
//!
//! Requests are JSON objects tagged `{"type": ..., "data": ...}`. Every
//! request gets a [`BridgeReply`]; failures carry a stable code and a
//! localized message, never a raw server code.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use protocol::UploadedFile;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

use crate::error::{ClientError, ClientResult};
use crate::session::Session;
use crate::storage::CredentialBackend;

// ============================================================================
// Payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCookieArgs {
    pub auth_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsArgs {
    pub username: String,
    pub password: String,
}

/// A file picked in the UI, content base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeFile {
    pub file_name: String,
    #[serde(serialize_with = "encode_base64", deserialize_with = "decode_base64")]
    pub content: Vec<u8>,
}

/// Serialize a reply result.
fn to_result<T: Serialize>(value: &T) -> ClientResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| ClientError::Protocol(format!("cannot serialize result: {}", e)))
}

fn encode_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&BASE64.encode(bytes))
}

fn decode_base64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    BASE64.decode(encoded).map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFilesArgs {
    pub current_dir: String,
    pub files: Vec<BridgeFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadFilesArgs {
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MakeDirectoryArgs {
    pub directory_path: String,
}

/// Every request the UI can make.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum BridgeRequest {
    GetCookie,
    SetCookie(SetCookieArgs),
    RemoveCookie,
    Login(CredentialsArgs),
    LoginWithCookie,
    Logout,
    Signup(CredentialsArgs),
    UploadFiles(UploadFilesArgs),
    DownloadFiles(DownloadFilesArgs),
    MakeDirectory(MakeDirectoryArgs),
}

impl BridgeRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeRequest::GetCookie => "getCookie",
            BridgeRequest::SetCookie(_) => "setCookie",
            BridgeRequest::RemoveCookie => "removeCookie",
            BridgeRequest::Login(_) => "login",
            BridgeRequest::LoginWithCookie => "loginWithCookie",
            BridgeRequest::Logout => "logout",
            BridgeRequest::Signup(_) => "signup",
            BridgeRequest::UploadFiles(_) => "uploadFiles",
            BridgeRequest::DownloadFiles(_) => "downloadFiles",
            BridgeRequest::MakeDirectory(_) => "makeDirectory",
        }
    }
}

// ============================================================================
// Replies
// ============================================================================

/// Error as shown to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeError {
    /// Stable code for programmatic handling.
    pub code: String,
    /// Localized message.
    pub message: String,
}

impl std::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for BridgeError {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeReply {
    pub error: Option<BridgeError>,
    pub result: Option<Value>,
}

impl BridgeReply {
    pub fn ok(result: Value) -> Self {
        Self {
            error: None,
            result: Some(result),
        }
    }

    pub fn empty() -> Self {
        Self {
            error: None,
            result: None,
        }
    }

    pub fn failure(error: &ClientError, locale: protocol::Locale) -> Self {
        Self {
            error: Some(BridgeError {
                code: error.code().to_string(),
                message: error.user_message(locale).to_string(),
            }),
            result: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Routes bridge requests onto a [`Session`].
pub struct Bridge<B: CredentialBackend> {
    session: Session<B>,
}

impl<B: CredentialBackend> Bridge<B> {
    pub fn new(session: Session<B>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session<B> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<B> {
        &mut self.session
    }

    /// Parse and handle one JSON request.
    pub async fn handle_json(&mut self, raw: &str) -> BridgeReply {
        match serde_json::from_str::<BridgeRequest>(raw) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                tracing::warn!(error = %e, "malformed bridge request");
                BridgeReply::failure(
                    &ClientError::Validation(e.to_string()),
                    self.session.locale(),
                )
            }
        }
    }

    pub async fn handle(&mut self, request: BridgeRequest) -> BridgeReply {
        let kind = request.kind();
        tracing::debug!(kind, "bridge request");
        match self.dispatch(request).await {
            Ok(Some(value)) => BridgeReply::ok(value),
            Ok(None) => BridgeReply::empty(),
            Err(e) => {
                tracing::info!(kind, error = %e, "bridge request failed");
                BridgeReply::failure(&e, self.session.locale())
            }
        }
    }

    async fn dispatch(&mut self, request: BridgeRequest) -> ClientResult<Option<Value>> {
        match request {
            BridgeRequest::GetCookie => {
                let cookie = self.session.jar().get_cookie()?;
                Ok(Some(to_result(&cookie)?))
            }
            BridgeRequest::SetCookie(args) => {
                self.session.jar().set_cookie(&args.auth_token)?;
                Ok(None)
            }
            BridgeRequest::RemoveCookie => {
                self.session.jar().remove_cookie()?;
                Ok(None)
            }
            BridgeRequest::Login(args) => {
                self.session.login(&args.username, &args.password).await?;
                let token = self
                    .session
                    .credential()
                    .map(|c| c.token().to_string())
                    .ok_or(ClientError::NotAuthenticated)?;
                Ok(Some(json!({ "authToken": token })))
            }
            BridgeRequest::LoginWithCookie => {
                let restored = self.session.restore().await?;
                Ok(Some(Value::Bool(restored)))
            }
            BridgeRequest::Logout => {
                self.session.logout().await?;
                Ok(None)
            }
            BridgeRequest::Signup(args) => {
                self.session.signup(&args.username, &args.password).await?;
                Ok(None)
            }
            BridgeRequest::UploadFiles(args) => {
                let files = args
                    .files
                    .into_iter()
                    .map(|f| UploadedFile {
                        file_name: f.file_name,
                        content: f.content,
                    })
                    .collect();
                self.session
                    .transfers()?
                    .upload(&args.current_dir, files)
                    .await?;
                Ok(None)
            }
            BridgeRequest::DownloadFiles(args) => {
                self.session.transfers()?.download(&args.paths)?;
                Ok(None)
            }
            BridgeRequest::MakeDirectory(args) => {
                self.session
                    .transfers()?
                    .make_directory(&args.directory_path)
                    .await?;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::storage::MemoryBackend;
    use crate::transfer::RecordingLauncher;
    use protocol::{CredentialFault, ErrorCategory, Locale};
    use std::sync::Arc;

    fn bridge(locale: Locale) -> Bridge<MemoryBackend> {
        let mut config = ClientConfig::with_server_url("http://127.0.0.1:1");
        config.ui.locale = locale;
        let session = Session::new(
            config,
            MemoryBackend::new(),
            Arc::new(RecordingLauncher::new()),
        )
        .unwrap();
        Bridge::new(session)
    }

    #[test]
    fn test_to_result_reports_serialization_failure() {
        let mut unserializable = std::collections::HashMap::new();
        unserializable.insert((1, 2), "tuple keys are not JSON");
        assert!(matches!(
            to_result(&unserializable),
            Err(ClientError::Protocol(_))
        ));
        assert_eq!(to_result(&Option::<u8>::None).unwrap(), Value::Null);
    }

    #[test]
    fn test_request_wire_format() {
        let request: BridgeRequest = serde_json::from_str(
            r#"{"type":"login","data":{"username":"alice","password":"pw"}}"#,
        )
        .unwrap();
        assert_eq!(
            request,
            BridgeRequest::Login(CredentialsArgs {
                username: "alice".to_string(),
                password: "pw".to_string(),
            })
        );

        let request: BridgeRequest = serde_json::from_str(r#"{"type":"getCookie"}"#).unwrap();
        assert_eq!(request, BridgeRequest::GetCookie);

        let request: BridgeRequest = serde_json::from_str(
            r#"{"type":"makeDirectory","data":{"directoryPath":"/new"}}"#,
        )
        .unwrap();
        assert_eq!(request.kind(), "makeDirectory");
    }

    #[test]
    fn test_upload_content_is_base64() {
        let request: BridgeRequest = serde_json::from_str(
            r#"{"type":"uploadFiles","data":{"currentDir":"/d","files":[{"fileName":"a.txt","content":"aGVsbG8="}]}}"#,
        )
        .unwrap();
        let BridgeRequest::UploadFiles(args) = request else {
            panic!("wrong variant");
        };
        assert_eq!(args.current_dir, "/d");
        assert_eq!(args.files[0].content, b"hello");

        let json = serde_json::to_value(&args.files[0]).unwrap();
        assert_eq!(json["content"], "aGVsbG8=");
    }

    #[test]
    fn test_failure_reply_is_localized() {
        let err = ClientError::Server(ErrorCategory::InvalidCredentials(
            CredentialFault::WrongPassword,
        ));
        let reply = BridgeReply::failure(&err, Locale::ZhCn);
        let error = reply.error.unwrap();
        assert_eq!(error.code, "INVALID_CREDENTIALS");
        assert_eq!(error.message, "密码不正确");
        assert!(reply.result.is_none());

        let reply = BridgeReply::failure(&ClientError::Unknown("x".into()), Locale::En);
        assert_eq!(reply.error.unwrap().message, "unknown error");
    }

    #[tokio::test]
    async fn test_cookie_requests() {
        let mut bridge = bridge(Locale::En);

        let reply = bridge.handle(BridgeRequest::GetCookie).await;
        assert_eq!(reply.result, Some(Value::Null));

        let reply = bridge
            .handle(BridgeRequest::SetCookie(SetCookieArgs {
                auth_token: "tok".to_string(),
            }))
            .await;
        assert!(reply.is_ok());

        let reply = bridge.handle(BridgeRequest::GetCookie).await;
        let cookie = reply.result.unwrap();
        assert_eq!(cookie["name"], "SPTF_AUTH");
        assert_eq!(cookie["value"], "tok");
        assert_eq!(cookie["expiresAt"], 7_260_796_800u64);

        assert!(bridge.handle(BridgeRequest::RemoveCookie).await.is_ok());
        let reply = bridge.handle(BridgeRequest::GetCookie).await;
        assert_eq!(reply.result, Some(Value::Null));
    }

    #[tokio::test]
    async fn test_transfers_need_login() {
        let mut bridge = bridge(Locale::ZhCn);
        let reply = bridge
            .handle(BridgeRequest::DownloadFiles(DownloadFilesArgs {
                paths: vec!["/a".to_string()],
            }))
            .await;
        let error = reply.error.unwrap();
        assert_eq!(error.code, "NOT_AUTHENTICATED");
        assert_eq!(error.message, "未登录");
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let mut bridge = bridge(Locale::En);
        let reply = bridge.handle_json(r#"{"type":"teleport"}"#).await;
        assert_eq!(reply.error.unwrap().code, "VALIDATION_ERROR");
    }
}
