use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

use shared::domain::{CredentialProfile, Credentials, PersistPlan};

/// Durable credential persistence backed by a local SQLite database.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct SavedCredentialsMeta {
    pub profile: CredentialProfile,
    pub username: String,
    pub remember_password: bool,
    pub has_password: bool,
    pub updated_at: DateTime<Utc>,
}

impl Storage {
    /// Opens (creating if needed) the database at `database_url`, including missing parent
    /// directories of an on-disk file.
    pub async fn new(database_url: &str) -> Result<Self> {
        if let Some(dir) = database_file(database_url).as_deref().and_then(Path::parent) {
            fs::create_dir_all(dir).with_context(|| {
                format!("failed to create directory '{}' for credential database", dir.display())
            })?;
        }

        let connect_options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid sqlite database url '{database_url}'"))?
            .create_if_missing(true);

        // Every pooled connection to an in-memory database would get its own empty database.
        let pool_options = if is_memory_url(database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open credential database '{database_url}'"))?;

        let storage = Self { pool };
        storage.ensure_credentials_table().await?;
        Ok(storage)
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn ensure_credentials_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS saved_credentials (
                profile           TEXT PRIMARY KEY NOT NULL,
                username          TEXT NOT NULL,
                password          TEXT,
                remember_password INTEGER NOT NULL DEFAULT 0,
                updated_at        TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure saved_credentials table exists")?;
        Ok(())
    }

    /// Returns the credentials stored for `profile`, if any.
    ///
    /// A stored password is only handed out while the row still asks for it to be remembered.
    pub async fn load_credentials(
        &self,
        profile: &CredentialProfile,
    ) -> Result<Option<Credentials>> {
        let row = sqlx::query(
            "SELECT username, password, remember_password FROM saved_credentials WHERE profile = ?",
        )
        .bind(profile.as_str())
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to load credentials for profile '{profile}'"))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let username: String = row.try_get("username")?;
        let password: Option<String> = row.try_get("password")?;
        let remember_password = row.try_get::<i64, _>("remember_password")? != 0;
        let password = if remember_password {
            password.unwrap_or_default()
        } else {
            String::new()
        };

        Ok(Some(Credentials::new(username, password, remember_password)))
    }

    pub async fn saved_credentials_meta(
        &self,
        profile: &CredentialProfile,
    ) -> Result<Option<SavedCredentialsMeta>> {
        let row = sqlx::query(
            "SELECT username, password IS NOT NULL AND password != '' AS has_password,
                    remember_password, updated_at
             FROM saved_credentials WHERE profile = ?",
        )
        .bind(profile.as_str())
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to inspect credentials for profile '{profile}'"))?;

        row.map(|row| {
            Ok(SavedCredentialsMeta {
                profile: profile.clone(),
                username: row.try_get("username")?,
                remember_password: row.try_get::<i64, _>("remember_password")? != 0,
                has_password: row.try_get::<i64, _>("has_password")? != 0,
                updated_at: row.try_get("updated_at")?,
            })
        })
        .transpose()
    }

    /// Writes `plan` for `profile`. `ForgetPassword` clears any password stored earlier.
    pub async fn apply_persist_plan(
        &self,
        profile: &CredentialProfile,
        plan: &PersistPlan,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO saved_credentials (profile, username, password, remember_password, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(profile) DO UPDATE SET
                username = excluded.username,
                password = excluded.password,
                remember_password = excluded.remember_password,
                updated_at = excluded.updated_at",
        )
        .bind(profile.as_str())
        .bind(plan.username())
        .bind(plan.password())
        .bind(i64::from(plan.remember_password()))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to persist credentials for profile '{profile}'"))?;

        debug!(
            profile = %profile,
            remember_password = plan.remember_password(),
            "storage: credentials persisted"
        );
        Ok(())
    }

    pub async fn clear_credentials(&self, profile: &CredentialProfile) -> Result<bool> {
        let result = sqlx::query("DELETE FROM saved_credentials WHERE profile = ?")
            .bind(profile.as_str())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to clear credentials for profile '{profile}'"))?;
        Ok(result.rows_affected() > 0)
    }
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

/// File behind a sqlite url; `None` for in-memory databases and non-sqlite urls.
fn database_file(database_url: &str) -> Option<PathBuf> {
    if is_memory_url(database_url) {
        return None;
    }
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = rest.split_once('?').map_or(rest, |(path, _)| path);
    (!path.is_empty()).then(|| PathBuf::from(path))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
