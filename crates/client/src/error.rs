//! Error types for the client crate.

use protocol::{ErrorCategory, Locale, ProtocolError};
use thiserror::Error;

use crate::config::ConfigError;
use crate::storage::StorageError;

/// Client error type covering every failure a caller can observe.
#[derive(Debug, Error)]
pub enum ClientError {
    // Transport errors
    /// The server could not be reached or the transport broke.
    #[error("network error: {0}")]
    Network(String),

    /// The channel was not open after the last readiness poll.
    #[error("connection not established after {attempts} attempts")]
    ConnectTimeout {
        /// Number of polls performed.
        attempts: u32,
    },

    /// The server sent something that does not follow the protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    // Server-reported errors
    /// The server reported a code from the error table.
    #[error("server error: {0}")]
    Server(ErrorCategory),

    /// The server failed without a recognizable code.
    #[error("unknown error: {0}")]
    Unknown(String),

    // Local errors
    /// Input rejected before any I/O.
    #[error("invalid input: {0}")]
    Validation(String),

    /// A directory request got no reply in time.
    #[error("request for {path} timed out")]
    RequestTimeout {
        /// Path that was requested.
        path: String,
    },

    /// The channel is closed or failed.
    #[error("connection closed")]
    ConnectionClosed,

    /// An operation needs a credential and none is held.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The credential store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The configuration is unusable.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for client operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// Error for a categorized server failure.
    ///
    /// `Unknown` never becomes `Server`.
    pub fn from_category(category: ErrorCategory) -> Self {
        match category {
            ErrorCategory::Unknown => ClientError::Unknown("unrecognized error code".to_string()),
            other => ClientError::Server(other),
        }
    }

    /// Error for a raw server error code.
    pub fn from_code(code: i64) -> Self {
        Self::from_category(protocol::classify(code))
    }

    /// The server category behind this error, if any.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            ClientError::Server(category) => Some(*category),
            _ => None,
        }
    }

    /// Whether the held credential must be discarded.
    pub fn is_credential_failure(&self) -> bool {
        self.category()
            .map(|c| c.is_credential_failure())
            .unwrap_or(false)
    }

    /// Stable identifier for programmatic handling.
    pub fn code(&self) -> &'static str {
        match self {
            ClientError::Network(_) => "NETWORK_ERROR",
            ClientError::ConnectTimeout { .. } => "CONNECT_TIMEOUT",
            ClientError::Protocol(_) => "PROTOCOL_ERROR",
            ClientError::Server(category) => match category {
                ErrorCategory::InternalServerError => "INTERNAL_SERVER_ERROR",
                ErrorCategory::InvalidCredentials(_) => "INVALID_CREDENTIALS",
                ErrorCategory::CookieExpired => "COOKIE_EXPIRED",
                ErrorCategory::CookieSetFailed => "COOKIE_SET_FAILED",
                ErrorCategory::CookieInvalid => "COOKIE_INVALID",
                ErrorCategory::PermissionDenied => "PERMISSION_DENIED",
                ErrorCategory::MalformedTransfer => "MALFORMED_TRANSFER",
                ErrorCategory::AlreadyExists => "ALREADY_EXISTS",
                ErrorCategory::Unknown => "UNKNOWN_ERROR",
            },
            ClientError::Unknown(_) => "UNKNOWN_ERROR",
            ClientError::Validation(_) => "VALIDATION_ERROR",
            ClientError::RequestTimeout { .. } => "REQUEST_TIMEOUT",
            ClientError::ConnectionClosed => "CONNECTION_CLOSED",
            ClientError::NotAuthenticated => "NOT_AUTHENTICATED",
            ClientError::Storage(_) => "STORAGE_ERROR",
            ClientError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Fixed user-facing message. Never contains a raw code.
    pub fn user_message(&self, locale: Locale) -> &'static str {
        let (en, zh) = match self {
            ClientError::Server(category) => return category.message(locale),
            ClientError::Network(_) => ("network error", "网络错误"),
            ClientError::ConnectTimeout { .. } => ("connection failed", "连接失败"),
            ClientError::Validation(_) => ("invalid input", "输入无效"),
            ClientError::RequestTimeout { .. } => ("request timed out", "请求超时"),
            ClientError::ConnectionClosed => ("connection closed", "连接已断开"),
            ClientError::NotAuthenticated => ("not logged in", "未登录"),
            ClientError::Storage(_) => ("credential storage unavailable", "凭据存储不可用"),
            ClientError::Config(_) => ("invalid configuration", "配置无效"),
            ClientError::Protocol(_) | ClientError::Unknown(_) => {
                return ErrorCategory::Unknown.message(locale)
            }
        };
        match locale {
            Locale::En => en,
            Locale::ZhCn => zh,
        }
    }
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        ClientError::Protocol(err.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Protocol(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => ClientError::ConnectionClosed,
            other => ClientError::Network(other.to_string()),
        }
    }
}
