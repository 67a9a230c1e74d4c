use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Context};
use serde::Deserialize;
use tracing::warn;
use url::Url;

pub const SETTINGS_FILE: &str = "login.toml";
const MIN_STATUS_POLL_SECONDS: u64 = 1;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server_url: String,
    pub status_url: Option<String>,
    pub database_url: String,
    pub profile: String,
    /// Zero waits for the server indefinitely.
    pub login_timeout_seconds: u64,
    pub status_poll_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8443".into(),
            status_url: None,
            database_url: default_database_url(),
            profile: shared::domain::CredentialProfile::DEFAULT.into(),
            login_timeout_seconds: 60,
            status_poll_seconds: 30,
        }
    }
}

impl Settings {
    pub fn server_url(&self) -> anyhow::Result<Url> {
        parse_http_url(&self.server_url).context("invalid server_url")
    }

    pub fn status_url(&self) -> anyhow::Result<Option<Url>> {
        match self.status_url.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => parse_http_url(raw)
                .context("invalid status_url")
                .map(Some),
        }
    }

    pub fn login_timeout(&self) -> Option<Duration> {
        (self.login_timeout_seconds > 0).then(|| Duration::from_secs(self.login_timeout_seconds))
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_secs(self.status_poll_seconds.max(MIN_STATUS_POLL_SECONDS))
    }
}

fn parse_http_url(raw: &str) -> anyhow::Result<Url> {
    let url = Url::parse(raw.trim()).with_context(|| format!("'{raw}' is not a url"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(anyhow!("url must start with http:// or https://, got {other}://")),
    }
}

fn default_database_url() -> String {
    let path = dirs::data_local_dir()
        .map(|dir| dir.join("login_cli").join("credentials.db"))
        .unwrap_or_else(|| PathBuf::from("./data/credentials.db"));
    format!("sqlite://{}", path.to_string_lossy().replace('\\', "/"))
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => match toml::from_str::<Settings>(&raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("config: ignoring unreadable {}: {err}", path.display());
                Settings::default()
            }
        },
        Err(_) => Settings::default(),
    };

    if let Some(v) = env("APP__SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = env("APP__STATUS_URL") {
        settings.status_url = Some(v);
    }
    if let Some(v) = env("APP__DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env("APP__PROFILE") {
        settings.profile = v;
    }
    if let Some(v) = env("APP__LOGIN_TIMEOUT_SECONDS") {
        match v.parse::<u64>() {
            Ok(parsed) => settings.login_timeout_seconds = parsed,
            Err(_) => warn!("config: APP__LOGIN_TIMEOUT_SECONDS is not a number: {v}"),
        }
    }
    if let Some(v) = env("APP__STATUS_POLL_SECONDS") {
        match v.parse::<u64>() {
            Ok(parsed) => settings.status_poll_seconds = parsed,
            Err(_) => warn!("config: APP__STATUS_POLL_SECONDS is not a number: {v}"),
        }
    }

    settings
}

/// Turns a configured database location into a sqlite url. Bare paths and `sqlite:path` become
/// `sqlite://path`; an empty value falls back to the per-user default.
pub fn database_url(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return default_database_url();
    }
    if raw.contains("://") || raw.starts_with("sqlite::memory:") {
        return raw.to_string();
    }
    let path = raw.strip_prefix("sqlite:").unwrap_or(raw);
    format!("sqlite://{}", path.replace('\\', "/"))
}
