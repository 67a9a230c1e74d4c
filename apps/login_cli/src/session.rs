use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{bail, Result};
use async_trait::async_trait;
use login_core::SessionInitializer;
use tracing::info;
use url::Url;

/// Marks the terminal client as signed in to `server_url`. Initializes at most once.
pub struct ConsoleSession {
    server_url: Url,
    initialized: AtomicBool,
}

impl ConsoleSession {
    pub fn new(server_url: Url) -> Self {
        Self {
            server_url,
            initialized: AtomicBool::new(false),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionInitializer for ConsoleSession {
    async fn initialize_client(&self) -> Result<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            bail!("client session for {} is already initialized", self.server_url);
        }
        info!(server = %self.server_url, "session: client session initialized");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initializes_only_once() {
        let session = ConsoleSession::new(Url::parse("https://auth.example.org").expect("url"));
        assert!(!session.is_initialized());
        session.initialize_client().await.expect("first init");
        assert!(session.is_initialized());
        assert!(session.initialize_client().await.is_err());
    }
}
