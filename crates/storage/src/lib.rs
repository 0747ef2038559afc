use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, info};

/// Outcome of comparing the stored version marker against the expected one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionCheck {
    Current,
    Reseeded { removed_keys: u64 },
}

/// Persistent string key-value storage addressed by fixed keys.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>>;
    async fn set_item(&self, key: &str, value: &str) -> Result<()>;
    async fn remove_item(&self, key: &str) -> Result<()>;
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
    /// Writes every pair in one transaction.
    async fn set_items(&self, items: &[(String, String)]) -> Result<()>;
    /// Wipes every key under `prefix` and writes `seed` plus the new version
    /// when the marker under `version_key` differs from `version`.
    async fn ensure_version(
        &self,
        prefix: &str,
        version_key: &str,
        version: &str,
        seed: &[(String, String)],
    ) -> Result<VersionCheck>;
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        let storage = Self { pool };
        storage.ensure_kv_table().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn ensure_kv_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key        TEXT PRIMARY KEY NOT NULL,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure kv_store table exists")?;
        Ok(())
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.get_item(key).await? else {
            return Ok(None);
        };
        let value = serde_json::from_str(&raw)
            .with_context(|| format!("stored value under '{key}' is not valid JSON"))?;
        Ok(Some(value))
    }

    pub async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)
            .with_context(|| format!("failed to serialize value for '{key}'"))?;
        self.set_item(key, &raw).await
    }

    pub async fn remove_prefix(&self, prefix: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM kv_store WHERE substr(key, 1, ?) = ?")
            .bind(prefix_len(prefix))
            .bind(prefix)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to remove keys under '{prefix}'"))?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl KvStore for Storage {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to read '{key}'"))?;
        Ok(row.map(|r| r.get::<String, _>(0)))
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO kv_store (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value, updated_at=CURRENT_TIMESTAMP",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to write '{key}'"))?;
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to remove '{key}'"))?;
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT key FROM kv_store WHERE substr(key, 1, ?) = ? ORDER BY key ASC",
        )
        .bind(prefix_len(prefix))
        .bind(prefix)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("failed to list keys under '{prefix}'"))?;
        Ok(rows.into_iter().map(|r| r.get::<String, _>(0)).collect())
    }

    async fn set_items(&self, items: &[(String, String)]) -> Result<()> {
        let mut tx = self.pool.begin().await.context("failed to begin write")?;
        for (key, value) in items {
            sqlx::query(
                "INSERT INTO kv_store (key, value) VALUES (?, ?)
                 ON CONFLICT(key) DO UPDATE SET value=excluded.value, updated_at=CURRENT_TIMESTAMP",
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to write '{key}'"))?;
        }
        tx.commit().await.context("failed to commit write")?;
        debug!(keys = items.len(), "persisted key batch");
        Ok(())
    }

    async fn ensure_version(
        &self,
        prefix: &str,
        version_key: &str,
        version: &str,
        seed: &[(String, String)],
    ) -> Result<VersionCheck> {
        let stored = self.get_item(version_key).await?;
        if stored.as_deref() == Some(version) {
            return Ok(VersionCheck::Current);
        }

        let mut tx = self.pool.begin().await.context("failed to begin reseed")?;
        let removed = sqlx::query("DELETE FROM kv_store WHERE substr(key, 1, ?) = ?")
            .bind(prefix_len(prefix))
            .bind(prefix)
            .execute(&mut *tx)
            .await
            .context("failed to wipe stale keys")?
            .rows_affected();
        let version_pair = (version_key.to_string(), version.to_string());
        for (key, value) in seed.iter().chain(std::iter::once(&version_pair)) {
            sqlx::query(
                "INSERT INTO kv_store (key, value) VALUES (?, ?)
                 ON CONFLICT(key) DO UPDATE SET value=excluded.value, updated_at=CURRENT_TIMESTAMP",
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to seed '{key}'"))?;
        }
        tx.commit().await.context("failed to commit reseed")?;

        info!(
            previous = stored.as_deref().unwrap_or("<none>"),
            %version,
            removed_keys = removed,
            "storage version changed; wiped and reseeded"
        );
        Ok(VersionCheck::Reseeded {
            removed_keys: removed,
        })
    }
}

fn prefix_len(prefix: &str) -> i64 {
    prefix.chars().count() as i64
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
