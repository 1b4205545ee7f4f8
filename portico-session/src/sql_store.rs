use crate::TokenStorage;
use async_trait::async_trait;
use portico_core::GatewayError;
use sqlx::Database;

/// Durable storage in a SQL key-value table.
#[derive(Clone, Debug)]
pub struct SqlStorage<DB: Database> {
    pool: sqlx::Pool<DB>,
    table_name: String,
}

impl<DB: Database> SqlStorage<DB> {
    pub fn new(pool: sqlx::Pool<DB>) -> Self {
        Self {
            pool,
            table_name: "portico_storage".to_string(),
        }
    }

    pub fn with_table_name(pool: sqlx::Pool<DB>, table_name: String) -> Self {
        Self { pool, table_name }
    }
}

#[cfg(feature = "sqlite")]
impl SqlStorage<sqlx::Sqlite> {
    /// Create the storage table if it does not exist.
    pub async fn migrate(&self) -> Result<(), GatewayError> {
        let query = format!(
            "CREATE TABLE IF NOT EXISTS {} (key TEXT PRIMARY KEY NOT NULL, value TEXT NOT NULL, updated_at INTEGER NOT NULL)",
            self.table_name
        );
        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| GatewayError::Storage(format!("Sqlite migrate error: {}", e)))?;
        Ok(())
    }
}

#[cfg(feature = "sqlite")]
#[async_trait]
impl TokenStorage for SqlStorage<sqlx::Sqlite> {
    async fn get(&self, key: &str) -> Result<Option<String>, GatewayError> {
        let query = format!("SELECT value FROM {} WHERE key = ?1", self.table_name);

        let row: Option<(String,)> = sqlx::query_as(&query)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| GatewayError::Storage(format!("Sqlite get error: {}", e)))?;

        Ok(row.map(|(value,)| value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), GatewayError> {
        let query = format!(
            "INSERT INTO {} (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
            self.table_name
        );
        let now = chrono::Utc::now().timestamp();

        sqlx::query(&query)
            .bind(key)
            .bind(value)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| GatewayError::Storage(format!("Sqlite set error: {}", e)))?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), GatewayError> {
        let query = format!("DELETE FROM {} WHERE key = ?1", self.table_name);
        sqlx::query(&query)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| GatewayError::Storage(format!("Sqlite remove error: {}", e)))?;
        Ok(())
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::{keys, SessionStore};
    use portico_core::{Identity, TokenGrant};
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Arc;

    async fn storage() -> SqlStorage<sqlx::Sqlite> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let storage = SqlStorage::new(pool);
        storage.migrate().await.unwrap();
        storage
    }

    #[tokio::test]
    async fn test_set_overwrites_and_remove_clears() {
        let storage = storage().await;
        storage.set(keys::TOKEN, "T1").await.unwrap();
        storage.set(keys::TOKEN, "T2").await.unwrap();
        assert_eq!(storage.get(keys::TOKEN).await.unwrap().as_deref(), Some("T2"));

        storage.remove(keys::TOKEN).await.unwrap();
        assert!(storage.get(keys::TOKEN).await.unwrap().is_none());
        storage.remove(keys::TOKEN).await.unwrap();
    }

    #[tokio::test]
    async fn test_session_survives_new_store() {
        let storage = Arc::new(storage().await);

        let first = SessionStore::new(storage.clone());
        first
            .login(
                TokenGrant::bearer("T1").with_refresh_token("R1"),
                Identity::new("u1"),
            )
            .await
            .unwrap();

        let second = SessionStore::new(storage);
        assert!(second.restore().await.unwrap());
        assert_eq!(second.access_token().as_deref(), Some("T1"));
        assert_eq!(
            second.stored_refresh_token().await.unwrap().as_deref(),
            Some("R1")
        );
    }
}
