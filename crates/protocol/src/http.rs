//! Request/reply API: endpoint paths and JSON bodies.

use serde::{Deserialize, Serialize};

pub const LOGIN_PATH: &str = "/login";
pub const LOGOUT_PATH: &str = "/logout";
pub const LOGIN_WITH_COOKIE_PATH: &str = "/login_with_cookie";
pub const SIGNUP_PATH: &str = "/signup";
pub const MAKE_DIRECTORY_PATH: &str = "/make_directory";
pub const UPLOAD_PATH: &str = "/upload";
pub const DOWNLOAD_PATH: &str = "/download";

/// Query parameter of [`DOWNLOAD_PATH`]: comma-joined remote paths.
pub const DOWNLOAD_PATHS_QUERY: &str = "paths";

/// WebSocket endpoint of the persistent channel.
pub const CHANNEL_PATH: &str = "/ws";
/// Query parameter carrying the credential on the channel handshake.
pub const AUTH_TOKEN_QUERY: &str = "auth_token";

/// Name of the cookie carrying the credential.
pub const AUTH_COOKIE_NAME: &str = "SPTF_AUTH";

/// Only responses with this status are guaranteed to carry an [`ErrorBody`].
pub const STRUCTURED_ERROR_STATUS: u16 = 500;

/// Archive name the server uses when several paths are downloaded at once.
pub const MULTI_DOWNLOAD_NAME: &str = "target.tar.gz";

/// Largest upload payload the server accepts.
pub const MAX_UPLOAD_SIZE: u64 = 64 * 1024 * 1024;

/// Body of `/login` and `/signup`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Successful `/login` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// The bearer token. Older servers name the field `uuid`.
    #[serde(alias = "uuid")]
    pub auth_token: String,
}

/// Body of `/make_directory`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MakeDirectoryRequest {
    pub directory_path: String,
}

/// Structured error body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Kept loose: servers have been seen sending non-integer codes.
    #[serde(default)]
    pub error_code: Option<serde_json::Value>,
}

/// Render the auth cookie header value for a token.
pub fn auth_cookie(token: &str) -> String {
    format!("{}={}", AUTH_COOKIE_NAME, token)
}
