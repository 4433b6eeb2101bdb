//! Server error codes and their categories.
//!
//! The server reports failures as a bare integer (`errorCode`), both in HTTP
//! error bodies and in channel replies. [`classify`] maps that integer onto a
//! fixed set of categories; anything outside the table is
//! [`ErrorCategory::Unknown`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Unexpected failure inside the server.
pub const INTERNAL_SERVER_ERROR: i64 = 0x0;
/// Login with a username that is not registered.
pub const USER_NOT_FOUND: i64 = 0x1;
/// Login with the wrong password.
pub const INCORRECT_PASSWORD: i64 = 0x2;
/// The auth cookie has expired.
pub const COOKIE_EXPIRED: i64 = 0x3;
/// The server could not store the auth cookie.
pub const COOKIE_SET_FAILED: i64 = 0x4;
/// The auth cookie did not validate.
pub const COOKIE_VALIDATION_FAILED: i64 = 0x5;
/// The user may not access the requested path.
pub const PERMISSION_DENIED: i64 = 0x6;
/// The upload payload could not be parsed.
pub const MALFORMED_TRANSFER: i64 = 0x7;
/// Signup with a username that is already taken.
pub const USERNAME_EXISTS: i64 = 0x8;

/// Which half of a username/password pair the server rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CredentialFault {
    /// No such user.
    UnknownUser,
    /// The user exists but the password does not match.
    WrongPassword,
}

/// Categorized server failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCategory {
    InternalServerError,
    InvalidCredentials(CredentialFault),
    CookieExpired,
    CookieSetFailed,
    CookieInvalid,
    PermissionDenied,
    MalformedTransfer,
    AlreadyExists,
    /// Any code outside the table, or a missing/malformed code.
    Unknown,
}

/// Map a numeric server error code to its category.
///
/// Total and pure: every integer has exactly one category.
pub fn classify(code: i64) -> ErrorCategory {
    match code {
        INTERNAL_SERVER_ERROR => ErrorCategory::InternalServerError,
        USER_NOT_FOUND => ErrorCategory::InvalidCredentials(CredentialFault::UnknownUser),
        INCORRECT_PASSWORD => ErrorCategory::InvalidCredentials(CredentialFault::WrongPassword),
        COOKIE_EXPIRED => ErrorCategory::CookieExpired,
        COOKIE_SET_FAILED => ErrorCategory::CookieSetFailed,
        COOKIE_VALIDATION_FAILED => ErrorCategory::CookieInvalid,
        PERMISSION_DENIED => ErrorCategory::PermissionDenied,
        MALFORMED_TRANSFER => ErrorCategory::MalformedTransfer,
        USERNAME_EXISTS => ErrorCategory::AlreadyExists,
        _ => ErrorCategory::Unknown,
    }
}

/// Classify an `errorCode` field taken from a JSON body.
///
/// A missing field, `null`, a string, or a non-integral number all map to
/// [`ErrorCategory::Unknown`].
pub fn classify_field(field: Option<&serde_json::Value>) -> ErrorCategory {
    field
        .and_then(serde_json::Value::as_i64)
        .map(classify)
        .unwrap_or(ErrorCategory::Unknown)
}

impl ErrorCategory {
    /// The code the server uses for this category, if it has one.
    pub fn code(&self) -> Option<i64> {
        let code = match self {
            ErrorCategory::InternalServerError => INTERNAL_SERVER_ERROR,
            ErrorCategory::InvalidCredentials(CredentialFault::UnknownUser) => USER_NOT_FOUND,
            ErrorCategory::InvalidCredentials(CredentialFault::WrongPassword) => INCORRECT_PASSWORD,
            ErrorCategory::CookieExpired => COOKIE_EXPIRED,
            ErrorCategory::CookieSetFailed => COOKIE_SET_FAILED,
            ErrorCategory::CookieInvalid => COOKIE_VALIDATION_FAILED,
            ErrorCategory::PermissionDenied => PERMISSION_DENIED,
            ErrorCategory::MalformedTransfer => MALFORMED_TRANSFER,
            ErrorCategory::AlreadyExists => USERNAME_EXISTS,
            ErrorCategory::Unknown => return None,
        };
        Some(code)
    }

    /// Whether the failure means the credential itself is no longer usable.
    pub fn is_credential_failure(&self) -> bool {
        matches!(
            self,
            ErrorCategory::CookieExpired | ErrorCategory::CookieInvalid
        )
    }

    /// The fixed user-facing message for this category.
    pub fn message(&self, locale: Locale) -> &'static str {
        match locale {
            Locale::En => match self {
                ErrorCategory::InternalServerError => "internal server error",
                ErrorCategory::InvalidCredentials(CredentialFault::UnknownUser) => {
                    "user does not exist"
                }
                ErrorCategory::InvalidCredentials(CredentialFault::WrongPassword) => {
                    "incorrect password"
                }
                ErrorCategory::CookieExpired => "credential expired",
                ErrorCategory::CookieSetFailed => "failed to set credential",
                ErrorCategory::CookieInvalid => "credential validation failed",
                ErrorCategory::PermissionDenied => "insufficient permission",
                ErrorCategory::MalformedTransfer => "malformed file-transfer payload",
                ErrorCategory::AlreadyExists => "username already exists",
                ErrorCategory::Unknown => "unknown error",
            },
            Locale::ZhCn => match self {
                ErrorCategory::InternalServerError => "服务器内部错误",
                ErrorCategory::InvalidCredentials(CredentialFault::UnknownUser) => "用户不存在",
                ErrorCategory::InvalidCredentials(CredentialFault::WrongPassword) => "密码不正确",
                ErrorCategory::CookieExpired => "Cookie已过期",
                ErrorCategory::CookieSetFailed => "Cookie设置失败",
                ErrorCategory::CookieInvalid => "Cookie验证失败",
                ErrorCategory::PermissionDenied => "您的权限不够",
                ErrorCategory::MalformedTransfer => "文件传输格式错误",
                ErrorCategory::AlreadyExists => "用户名已存在",
                ErrorCategory::Unknown => "未知错误",
            },
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message(Locale::En))
    }
}

/// Language of user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "en")]
    En,
    #[serde(rename = "zh-CN")]
    ZhCn,
}

impl Locale {
    /// The tag used in configuration files.
    pub fn tag(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::ZhCn => "zh-CN",
        }
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "en" | "en-us" | "en-gb" => Ok(Locale::En),
            "zh" | "zh-cn" | "zh-hans" => Ok(Locale::ZhCn),
            _ => Err(format!("unsupported locale: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_codes() {
        assert_eq!(classify(0x0), ErrorCategory::InternalServerError);
        assert_eq!(
            classify(0x1),
            ErrorCategory::InvalidCredentials(CredentialFault::UnknownUser)
        );
        assert_eq!(
            classify(0x2),
            ErrorCategory::InvalidCredentials(CredentialFault::WrongPassword)
        );
        assert_eq!(classify(0x3), ErrorCategory::CookieExpired);
        assert_eq!(classify(0x4), ErrorCategory::CookieSetFailed);
        assert_eq!(classify(0x5), ErrorCategory::CookieInvalid);
        assert_eq!(classify(0x6), ErrorCategory::PermissionDenied);
        assert_eq!(classify(0x7), ErrorCategory::MalformedTransfer);
        assert_eq!(classify(0x8), ErrorCategory::AlreadyExists);
    }

    #[test]
    fn test_out_of_table_codes_are_unknown() {
        for code in [-1, 0x9, 0x10, 500, i64::MAX, i64::MIN] {
            assert_eq!(classify(code), ErrorCategory::Unknown, "code {}", code);
        }
    }

    #[test]
    fn test_classify_is_order_independent() {
        let forward: Vec<_> = (0..=8).map(classify).collect();
        let backward: Vec<_> = (0..=8).rev().map(classify).collect();
        let reversed: Vec<_> = backward.into_iter().rev().collect();
        assert_eq!(forward, reversed);
    }

    #[test]
    fn test_code_roundtrips_through_table() {
        for code in 0..=8 {
            assert_eq!(classify(code).code(), Some(code));
        }
        assert_eq!(ErrorCategory::Unknown.code(), None);
    }

    #[test]
    fn test_classify_field() {
        assert_eq!(
            classify_field(Some(&json!(2))),
            ErrorCategory::InvalidCredentials(CredentialFault::WrongPassword)
        );
        assert_eq!(
            classify_field(Some(&json!(0))),
            ErrorCategory::InternalServerError
        );
        assert_eq!(classify_field(None), ErrorCategory::Unknown);
        assert_eq!(classify_field(Some(&json!(null))), ErrorCategory::Unknown);
        assert_eq!(classify_field(Some(&json!("2"))), ErrorCategory::Unknown);
        assert_eq!(classify_field(Some(&json!(2.5))), ErrorCategory::Unknown);
    }

    #[test]
    fn test_messages() {
        assert_eq!(classify(0x2).message(Locale::En), "incorrect password");
        assert_eq!(classify(0x2).message(Locale::ZhCn), "密码不正确");
        assert_eq!(classify(0x42).message(Locale::ZhCn), "未知错误");
        assert_eq!(classify(0x6).to_string(), "insufficient permission");
    }

    #[test]
    fn test_credential_failures() {
        assert!(ErrorCategory::CookieExpired.is_credential_failure());
        assert!(ErrorCategory::CookieInvalid.is_credential_failure());
        assert!(!ErrorCategory::PermissionDenied.is_credential_failure());
    }

    #[test]
    fn test_locale_parsing() {
        assert_eq!("en".parse::<Locale>().unwrap(), Locale::En);
        assert_eq!("zh-CN".parse::<Locale>().unwrap(), Locale::ZhCn);
        assert_eq!("ZH".parse::<Locale>().unwrap(), Locale::ZhCn);
        assert!("fr".parse::<Locale>().is_err());
        assert_eq!(Locale::ZhCn.tag(), "zh-CN");
    }
}
