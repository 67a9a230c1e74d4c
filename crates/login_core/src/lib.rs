use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use shared::{
    domain::{AuthResultCode, Credentials},
    error::AuthErrorCode,
};

pub mod auth_client;
pub mod coordinator;
pub mod credential_store;
pub mod error;
pub mod status_feed;
pub mod types;

pub use auth_client::HttpAuthClient;
pub use coordinator::{CoordinatorDeps, LoginCoordinator};
pub use credential_store::{MemoryCredentialStore, SqliteCredentialStore};
pub use error::{ActivateError, LoginFailure, SubmitError};
pub use status_feed::HttpStatusFeed;
pub use types::{Alert, AlertKind, CoordinatorOptions, LoginEvent, LoginSnapshot, LoginState};

/// Loads, stages and persists the credentials used for login.
///
/// `make_current` only stages the credentials for the next attempt; nothing becomes durable
/// until `save`, which must honour [`Credentials::persist_plan`].
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> Result<Credentials>;
    async fn make_current(&self, credentials: &Credentials) -> Result<()>;
    async fn save(&self) -> Result<()>;
}

/// Source of human readable server health text. Each subscription is an independent stream.
pub trait ServerStatusFeed: Send + Sync {
    fn subscribe(&self) -> BoxStream<'static, Option<String>>;
}

#[async_trait]
pub trait AuthClient: Send + Sync {
    /// Performs one authentication attempt. Completes exactly once.
    async fn attempt_login(&self, credentials: &Credentials) -> AuthResultCode;
}

#[async_trait]
pub trait SessionInitializer: Send + Sync {
    async fn initialize_client(&self) -> Result<()>;
}

pub struct MissingCredentialStore;

#[async_trait]
impl CredentialStore for MissingCredentialStore {
    async fn load(&self) -> Result<Credentials> {
        Err(anyhow!("credential store is unavailable"))
    }

    async fn make_current(&self, _credentials: &Credentials) -> Result<()> {
        Err(anyhow!("credential store is unavailable"))
    }

    async fn save(&self) -> Result<()> {
        Err(anyhow!("credential store is unavailable"))
    }
}

pub struct MissingStatusFeed;

impl ServerStatusFeed for MissingStatusFeed {
    fn subscribe(&self) -> BoxStream<'static, Option<String>> {
        stream::empty().boxed()
    }
}

pub struct MissingAuthClient;

#[async_trait]
impl AuthClient for MissingAuthClient {
    async fn attempt_login(&self, _credentials: &Credentials) -> AuthResultCode {
        AuthErrorCode::ConnectFailed.code()
    }
}

pub struct MissingSessionInitializer;

#[async_trait]
impl SessionInitializer for MissingSessionInitializer {
    async fn initialize_client(&self) -> Result<()> {
        Err(anyhow!("client session initializer is unavailable"))
    }
}
