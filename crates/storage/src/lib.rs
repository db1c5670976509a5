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

use shared::protocol::PersistedState;

pub const DEFAULT_STORAGE_KEY: &str = "forge-storage";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub state: PersistedState,
    pub updated_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid sqlite url '{database_url}'"))?
            .create_if_missing(true);
        // A single connection keeps `sqlite::memory:` databases shared
        // between queries.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open state database '{database_url}'"))?;
        let storage = Self { pool };
        storage.ensure_state_table().await?;
        Ok(storage)
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn ensure_state_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS persisted_state (
                storage_key TEXT PRIMARY KEY NOT NULL,
                payload     TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure persisted_state table exists")?;
        Ok(())
    }

    pub async fn save_state(&self, storage_key: &str, state: &PersistedState) -> Result<()> {
        let payload =
            serde_json::to_string(state).context("failed to encode persisted state record")?;
        sqlx::query(
            "INSERT INTO persisted_state (storage_key, payload, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(storage_key) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
        )
        .bind(storage_key)
        .bind(payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to save persisted state '{storage_key}'"))?;
        Ok(())
    }

    pub async fn load_state(&self, storage_key: &str) -> Result<Option<PersistedState>> {
        Ok(self
            .load_record(storage_key)
            .await?
            .map(|record| record.state))
    }

    pub async fn load_record(&self, storage_key: &str) -> Result<Option<StoredRecord>> {
        let row = sqlx::query("SELECT payload, updated_at FROM persisted_state WHERE storage_key = ?")
            .bind(storage_key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to load persisted state '{storage_key}'"))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload: String = row.try_get("payload")?;
        let updated_at: String = row.try_get("updated_at")?;
        let state = serde_json::from_str::<PersistedState>(&payload)
            .with_context(|| format!("corrupt persisted state payload for '{storage_key}'"))?;
        let updated_at = DateTime::parse_from_rfc3339(&updated_at)
            .with_context(|| format!("invalid updated_at timestamp for '{storage_key}'"))?
            .with_timezone(&Utc);

        Ok(Some(StoredRecord { state, updated_at }))
    }

    pub async fn clear_state(&self, storage_key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM persisted_state WHERE storage_key = ?")
            .bind(storage_key)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to clear persisted state '{storage_key}'"))?;
        Ok(result.rows_affected() > 0)
    }
}

pub fn sqlite_url_for_path(path: &Path) -> String {
    format!("sqlite://{}", path.to_string_lossy().replace('\\', "/"))
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
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
