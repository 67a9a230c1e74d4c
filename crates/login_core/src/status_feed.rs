use std::time::Duration;

use anyhow::{Context, Result};
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::{redirect, Client};
use tracing::debug;
use url::Url;

use crate::ServerStatusFeed;

pub const DEFAULT_STATUS_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const STATUS_USER_AGENT: &str = "UruClient/1.0";
const STATUS_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_STATUS_REDIRECTS: usize = 5;
const MAX_STATUS_CHARS: usize = 255;

/// Polls a plain text status endpoint: once on subscribe, then every `poll_interval`.
///
/// Fetch errors are published as the status text itself. Without a URL the stream is empty.
#[derive(Clone)]
pub struct HttpStatusFeed {
    http: Client,
    status_url: Option<Url>,
    poll_interval: Duration,
}

impl HttpStatusFeed {
    pub fn new(status_url: Option<Url>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(STATUS_USER_AGENT)
            .redirect(redirect::Policy::limited(MAX_STATUS_REDIRECTS))
            .timeout(STATUS_REQUEST_TIMEOUT)
            .build()
            .context("failed to build status http client")?;
        Ok(Self {
            http,
            status_url,
            poll_interval: DEFAULT_STATUS_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

async fn fetch_status(http: &Client, url: &Url) -> Result<Option<String>> {
    let body = http
        .get(url.clone())
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(normalize_status_text(&body))
}

fn normalize_status_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_STATUS_CHARS).collect())
}

async fn poll_status(http: &Client, url: &Url) -> Option<String> {
    match fetch_status(http, url).await {
        Ok(text) => text,
        Err(err) => {
            debug!("status: fetch failed url={url}: {err:#}");
            normalize_status_text(&format!("Server status unavailable: {err}"))
        }
    }
}

impl ServerStatusFeed for HttpStatusFeed {
    fn subscribe(&self) -> BoxStream<'static, Option<String>> {
        let Some(url) = self.status_url.clone() else {
            return stream::empty().boxed();
        };
        let http = self.http.clone();
        let poll_interval = self.poll_interval;

        stream::unfold(true, move |first| {
            let http = http.clone();
            let url = url.clone();
            async move {
                if !first {
                    tokio::time::sleep(poll_interval).await;
                }
                Some((poll_status(&http, &url).await, false))
            }
        })
        .boxed()
    }
}

#[cfg(test)]
#[path = "tests/status_feed_tests.rs"]
mod tests;
