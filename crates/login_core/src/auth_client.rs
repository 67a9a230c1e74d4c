use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use shared::{
    domain::{AuthResultCode, Credentials},
    error::{ApiError, AuthErrorCode},
    protocol::{LoginRequest, LoginResponse},
};
use tracing::{debug, warn};
use url::Url;

use crate::AuthClient;

const AUTH_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Authenticates with `POST {server_url}/login`.
///
/// Transport problems are folded into result codes so every attempt completes exactly once.
pub struct HttpAuthClient {
    http: Client,
    login_url: Url,
}

impl HttpAuthClient {
    pub fn new(server_url: &Url) -> Result<Self> {
        let login_url = Url::parse(&format!(
            "{}/login",
            server_url.as_str().trim_end_matches('/')
        ))
        .with_context(|| format!("invalid login url derived from {server_url}"))?;
        let http = Client::builder()
            .connect_timeout(AUTH_CONNECT_TIMEOUT)
            .build()
            .context("failed to build auth http client")?;
        Ok(Self { http, login_url })
    }

    pub fn login_url(&self) -> &Url {
        &self.login_url
    }
}

fn transport_error_code(err: &reqwest::Error) -> AuthResultCode {
    if err.is_timeout() {
        AuthErrorCode::Timeout.code()
    } else if err.is_connect() {
        AuthErrorCode::ConnectFailed.code()
    } else {
        AuthErrorCode::Disconnected.code()
    }
}

fn result_code_from_body(status: StatusCode, body: &[u8]) -> AuthResultCode {
    if let Ok(response) = serde_json::from_slice::<LoginResponse>(body) {
        return AuthResultCode(response.result_code);
    }
    if let Ok(api_error) = serde_json::from_slice::<ApiError>(body) {
        if let Some(code) = api_error.result_code {
            return AuthResultCode(code);
        }
        warn!("auth: server error without result code status={status}: {api_error}");
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AuthErrorCode::AuthenticationFailed.code()
        }
        _ => AuthErrorCode::ServerError.code(),
    }
}

#[async_trait]
impl AuthClient for HttpAuthClient {
    async fn attempt_login(&self, credentials: &Credentials) -> AuthResultCode {
        let request = LoginRequest {
            username: credentials.username.clone(),
            password: credentials.password.clone(),
        };

        let response = match self
            .http
            .post(self.login_url.clone())
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!("auth: login request failed url={}: {err}", self.login_url);
                return transport_error_code(&err);
            }
        };

        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(err) => {
                warn!("auth: login response body failed status={status}: {err}");
                return transport_error_code(&err);
            }
        };

        let code = result_code_from_body(status, &body);
        debug!(status = %status, result_code = code.0, "auth: login completed");
        code
    }
}

#[cfg(test)]
#[path = "tests/auth_client_tests.rs"]
mod tests;
