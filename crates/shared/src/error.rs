use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::AuthResultCode;

pub const AUTH_FAILED_HEADLINE: &str = "Authentication Failed. Please try again.";

/// Failure codes the authentication service is known to return.
///
/// The numbering follows the service's network error table; unknown codes are kept verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorCode {
    Timeout,
    ConnectFailed,
    Disconnected,
    AccountNotFound,
    AuthenticationFailed,
    LoginDenied,
    AccountNotActivated,
    TooManyFailedLogins,
    ServerError,
    AccountBanned,
    Other(i32),
}

impl AuthErrorCode {
    pub fn from_code(code: AuthResultCode) -> Self {
        match code.0 {
            2 => Self::Timeout,
            5 => Self::ConnectFailed,
            6 => Self::Disconnected,
            13 => Self::AccountNotFound,
            20 => Self::AuthenticationFailed,
            22 => Self::LoginDenied,
            24 => Self::AccountNotActivated,
            33 => Self::TooManyFailedLogins,
            37 => Self::ServerError,
            38 => Self::AccountBanned,
            other => Self::Other(other),
        }
    }

    pub fn code(self) -> AuthResultCode {
        AuthResultCode(match self {
            Self::Timeout => 2,
            Self::ConnectFailed => 5,
            Self::Disconnected => 6,
            Self::AccountNotFound => 13,
            Self::AuthenticationFailed => 20,
            Self::LoginDenied => 22,
            Self::AccountNotActivated => 24,
            Self::TooManyFailedLogins => 33,
            Self::ServerError => 37,
            Self::AccountBanned => 38,
            Self::Other(code) => code,
        })
    }

    pub fn detail(self) -> String {
        match self {
            Self::Timeout => "The server did not answer in time.".to_string(),
            Self::ConnectFailed => "Unable to connect to the server.".to_string(),
            Self::Disconnected => "Disconnected from the server.".to_string(),
            Self::AccountNotFound => "Account Not Found.".to_string(),
            Self::AuthenticationFailed => {
                "Incorrect password.\n\nMake sure CAPS LOCK is not on.".to_string()
            }
            Self::LoginDenied => "Login denied by the server.".to_string(),
            Self::AccountNotActivated => "Account Not Activated.".to_string(),
            Self::TooManyFailedLogins => {
                "Too many failed logins, please try again later.".to_string()
            }
            Self::ServerError => {
                "The server reported an error, please try again in a few minutes.".to_string()
            }
            Self::AccountBanned => "Your account has been banned. If you are unsure as to why \
                                    this happened please contact customer support."
                .to_string(),
            Self::Other(code) => format!("Login failed with code {code}."),
        }
    }
}

impl From<AuthResultCode> for AuthErrorCode {
    fn from(value: AuthResultCode) -> Self {
        Self::from_code(value)
    }
}

/// Error body returned by the HTTP login endpoint on non-success status codes.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct ApiError {
    #[serde(default)]
    pub result_code: Option<i32>,
    pub message: String,
}

impl ApiError {
    pub fn new(result_code: Option<i32>, message: impl Into<String>) -> Self {
        Self {
            result_code,
            message: message.into(),
        }
    }
}
