use std::time::Duration;

use shared::{
    domain::AuthResultCode,
    error::{AuthErrorCode, AUTH_FAILED_HEADLINE},
};
use thiserror::Error;

/// Why a submitted login did not end in a logged in session. Every variant is retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoginFailure {
    #[error("authentication rejected with code {0}")]
    Rejected(AuthResultCode),
    #[error("authentication did not complete within {after:?}")]
    TimedOut { after: Duration },
    #[error("authentication task aborted: {0}")]
    AttemptAborted(String),
    #[error("client session setup failed: {0}")]
    SessionSetup(String),
}

impl LoginFailure {
    pub fn user_message(&self) -> String {
        let detail = match self {
            LoginFailure::Rejected(code) => AuthErrorCode::from_code(*code).detail(),
            LoginFailure::TimedOut { .. } => AuthErrorCode::Timeout.detail(),
            LoginFailure::AttemptAborted(_) => "The login attempt was interrupted.".to_string(),
            LoginFailure::SessionSetup(_) => {
                "Signed in, but the client session could not be started.".to_string()
            }
        };
        format!("{AUTH_FAILED_HEADLINE}\n{detail}")
    }

    pub fn result_code(&self) -> Option<AuthResultCode> {
        match self {
            LoginFailure::Rejected(code) => Some(*code),
            LoginFailure::TimedOut { .. } => Some(AuthErrorCode::Timeout.code()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("login coordinator is not active")]
    NotActive,
    #[error("a login attempt is already in progress")]
    AttemptInFlight,
    #[error("already logged in")]
    AlreadyLoggedIn,
    #[error("username must not be empty")]
    EmptyUsername,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ActivateError {
    #[error("login coordinator was deactivated and cannot be reactivated")]
    Deactivated,
}
