use anyhow::Result;
use async_trait::async_trait;
use shared::domain::{CredentialProfile, Credentials, PersistPlan};
use storage::Storage;
use tokio::sync::Mutex;
use tracing::debug;

use crate::CredentialStore;

fn credentials_from_plan(plan: &PersistPlan) -> Credentials {
    Credentials::new(
        plan.username(),
        plan.password().unwrap_or_default(),
        plan.remember_password(),
    )
}

/// In-process store. Nothing survives the process.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<MemoryStoreState>,
}

#[derive(Default)]
struct MemoryStoreState {
    persisted: Option<Credentials>,
    current: Option<Credentials>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_persisted(credentials: Credentials) -> Self {
        let plan = credentials.persist_plan();
        Self {
            inner: Mutex::new(MemoryStoreState {
                persisted: Some(credentials_from_plan(&plan)),
                current: None,
            }),
        }
    }

    pub async fn persisted(&self) -> Option<Credentials> {
        self.inner.lock().await.persisted.clone()
    }

    pub async fn current(&self) -> Option<Credentials> {
        self.inner.lock().await.current.clone()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Credentials> {
        Ok(self
            .inner
            .lock()
            .await
            .persisted
            .clone()
            .unwrap_or_default())
    }

    async fn make_current(&self, credentials: &Credentials) -> Result<()> {
        self.inner.lock().await.current = Some(credentials.clone());
        Ok(())
    }

    async fn save(&self) -> Result<()> {
        let mut guard = self.inner.lock().await;
        let Some(current) = guard.current.as_ref() else {
            debug!("credentials: save skipped, nothing staged");
            return Ok(());
        };
        let plan = current.persist_plan();
        guard.persisted = Some(credentials_from_plan(&plan));
        Ok(())
    }
}

/// Store backed by the local credential database, one row per [`CredentialProfile`].
pub struct SqliteCredentialStore {
    storage: Storage,
    profile: CredentialProfile,
    current: Mutex<Option<Credentials>>,
}

impl SqliteCredentialStore {
    pub fn new(storage: Storage, profile: CredentialProfile) -> Self {
        Self {
            storage,
            profile,
            current: Mutex::new(None),
        }
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn load(&self) -> Result<Credentials> {
        let loaded = self.storage.load_credentials(&self.profile).await?;
        Ok(loaded.unwrap_or_default())
    }

    async fn make_current(&self, credentials: &Credentials) -> Result<()> {
        *self.current.lock().await = Some(credentials.clone());
        Ok(())
    }

    async fn save(&self) -> Result<()> {
        let plan = {
            let guard = self.current.lock().await;
            let Some(current) = guard.as_ref() else {
                debug!(profile = %self.profile, "credentials: save skipped, nothing staged");
                return Ok(());
            };
            current.persist_plan()
        };
        self.storage.apply_persist_plan(&self.profile, &plan).await
    }
}

#[cfg(test)]
#[path = "tests/credential_store_tests.rs"]
mod tests;
