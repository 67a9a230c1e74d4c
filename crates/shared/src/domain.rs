use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Username, password and the "remember password" choice as edited on the login form.
///
/// The password buffer is wiped when the value is dropped and is never printed by `Debug`.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub remember_password: bool,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        remember_password: bool,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            remember_password,
        }
    }

    /// Login is only offered once a username has been entered.
    pub fn can_submit(&self) -> bool {
        !self.username.trim().is_empty()
    }

    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }

    /// Decides what durable storage may keep for these credentials.
    pub fn persist_plan(&self) -> PersistPlan {
        if self.remember_password {
            PersistPlan::RememberPassword {
                username: self.username.clone(),
                password: self.password.clone(),
            }
        } else {
            PersistPlan::ForgetPassword {
                username: self.username.clone(),
            }
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &format_args!("<{} bytes redacted>", self.password.len()))
            .field("remember_password", &self.remember_password)
            .finish()
    }
}

impl Drop for Credentials {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

/// What a credential store is allowed to write after a successful login.
///
/// `ForgetPassword` also means any password stored earlier for the profile must be cleared.
#[derive(PartialEq, Eq)]
pub enum PersistPlan {
    RememberPassword { username: String, password: String },
    ForgetPassword { username: String },
}

impl PersistPlan {
    pub fn username(&self) -> &str {
        match self {
            PersistPlan::RememberPassword { username, .. }
            | PersistPlan::ForgetPassword { username } => username,
        }
    }

    pub fn password(&self) -> Option<&str> {
        match self {
            PersistPlan::RememberPassword { password, .. } => Some(password),
            PersistPlan::ForgetPassword { .. } => None,
        }
    }

    pub fn remember_password(&self) -> bool {
        matches!(self, PersistPlan::RememberPassword { .. })
    }
}

impl fmt::Debug for PersistPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistPlan::RememberPassword { username, .. } => f
                .debug_struct("RememberPassword")
                .field("username", username)
                .finish_non_exhaustive(),
            PersistPlan::ForgetPassword { username } => f
                .debug_struct("ForgetPassword")
                .field("username", username)
                .finish(),
        }
    }
}

impl Drop for PersistPlan {
    fn drop(&mut self) {
        if let PersistPlan::RememberPassword { password, .. } = self {
            password.zeroize();
        }
    }
}

/// Named slot under which one set of credentials is persisted, usually one per server.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialProfile(String);

impl CredentialProfile {
    pub const DEFAULT: &'static str = "default";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CredentialProfile {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl fmt::Display for CredentialProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Completion code of one authentication attempt. Zero is success, anything else failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthResultCode(pub i32);

impl AuthResultCode {
    pub const SUCCESS: AuthResultCode = AuthResultCode(0);

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }
}

impl fmt::Display for AuthResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
