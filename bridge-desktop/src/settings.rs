//! SQLite-backed key/value persistence for small runtime state.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SettingsStore,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::debug;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
)
"#;

/// Durable settings store on top of a single SQLite table.
///
/// The playback core only parks small best-effort state here, the
/// preload prediction context chief among it, so one key/value table
/// with upsert writes is the whole schema. Everything runs through
/// sqlx's async pool and survives process restarts.
pub struct SqliteSettingsStore {
    pool: SqlitePool,
}

fn db_error(op: &str, e: sqlx::Error) -> BridgeError {
    BridgeError::OperationFailed(format!("settings {}: {}", op, e))
}

impl SqliteSettingsStore {
    /// Opens (creating if needed) the database at `db_path`.
    pub async fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(BridgeError::Io)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| db_error("connect", e))?;

        Self::migrate(&pool).await?;
        debug!(path = ?db_path, "settings store ready");

        Ok(Self { pool })
    }

    /// Transient in-memory variant used by tests.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| db_error("connect", e))?;
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| db_error("connect", e))?;

        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(pool)
            .await
            .map_err(|e| db_error("migrate", e))?;
        Ok(())
    }

    fn unix_now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET \
             value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Self::unix_now())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("write", e))?;

        debug!(key, "setting written");
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("read", e))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete", e))?;

        debug!(key, "setting deleted");
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        sqlx::query_scalar("SELECT key FROM settings ORDER BY key")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("list", e))
    }

    async fn clear_all(&self) -> Result<()> {
        sqlx::query("DELETE FROM settings")
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("clear", e))?;

        debug!("settings cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteSettingsStore {
        SqliteSettingsStore::in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_and_delete() {
        let store = store().await;

        store.set_string("preload.ctx", "{}").await.unwrap();
        assert_eq!(
            store.get_string("preload.ctx").await.unwrap().as_deref(),
            Some("{}")
        );

        store.delete("preload.ctx").await.unwrap();
        assert_eq!(store.get_string("preload.ctx").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_key_reads_as_none() {
        let store = store().await;
        assert_eq!(store.get_string("absent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rewrite_replaces_previous_value() {
        let store = store().await;

        store.set_string("ctx", "old").await.unwrap();
        store.set_string("ctx", "new").await.unwrap();

        assert_eq!(store.get_string("ctx").await.unwrap().as_deref(), Some("new"));
        assert_eq!(store.list_keys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_keys_list_sorted() {
        let store = store().await;

        store.set_string("b", "2").await.unwrap();
        store.set_string("a", "1").await.unwrap();

        assert_eq!(store.list_keys().await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_clear_all_empties_the_table() {
        let store = store().await;

        store.set_string("a", "1").await.unwrap();
        store.set_string("b", "2").await.unwrap();
        store.clear_all().await.unwrap();

        assert!(store.list_keys().await.unwrap().is_empty());
    }
}
