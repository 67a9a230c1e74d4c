use std::time::Duration;

use shared::domain::Credentials;

use crate::error::LoginFailure;

pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Idle,
    LoggingIn,
    Failed,
    /// Terminal. The session layer owns everything from here on.
    LoggedIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    LoggingIn,
    LoginFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
}

impl Alert {
    pub fn logging_in() -> Self {
        Self {
            kind: AlertKind::LoggingIn,
            message: "Logging in...".to_string(),
        }
    }

    pub fn login_failed(failure: &LoginFailure) -> Self {
        Self {
            kind: AlertKind::LoginFailed,
            message: failure.user_message(),
        }
    }
}

/// Everything a presentation layer may render about the login flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSnapshot {
    pub credentials: Credentials,
    pub status_text: String,
    pub login_state: LoginState,
    pub alert: Option<Alert>,
    pub last_failure: Option<LoginFailure>,
    pub logged_in: bool,
}

impl LoginSnapshot {
    pub fn alert_visible(&self) -> bool {
        self.alert.is_some()
    }

    pub fn alert_kind(&self) -> Option<AlertKind> {
        self.alert.as_ref().map(|alert| alert.kind)
    }
}

impl Default for LoginSnapshot {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            status_text: String::new(),
            login_state: LoginState::Idle,
            alert: None,
            last_failure: None,
            logged_in: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum LoginEvent {
    StatusUpdated(String),
    AttemptStarted { username: String },
    LoginFailed(LoginFailure),
    LoggedIn { username: String },
    Deactivated,
}

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// `None` waits for the auth client indefinitely.
    pub login_timeout: Option<Duration>,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            login_timeout: Some(DEFAULT_LOGIN_TIMEOUT),
        }
    }
}
