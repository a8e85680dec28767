#[cfg(feature = "sqlite")]
mod db_impl {
    use crate::error::StorageError;
    use crate::storage::{check_quota, LocalStorage};
    use async_trait::async_trait;
    use rusqlite::{Connection, OptionalExtension};
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tracing::{debug, info};


    /// SQLite file holding the local mirror, one row per storage key.
    #[derive(Debug)]
    pub struct Database {
        conn: Arc<Mutex<Connection>>,
        quota: Option<usize>,
    }

    impl Database {
        // Create a new database connection
        pub fn new(db_path: &str, quota: Option<usize>) -> Result<Self, StorageError> {
            let conn = Connection::open(db_path)?;
            info!("[DB] Database connection established at: {}", db_path);
            Ok(Database {
                conn: Arc::new(Mutex::new(conn)),
                quota,
            })
        }

        pub async fn create_schema(&self) -> Result<(), StorageError> {
            let conn = self.conn.lock().await;
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS storage (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
                );",
            )
            .map_err(|e| {
                tracing::error!("[DB] Failed creating storage table: {}", e);
                e
            })?;
            Ok(())
        }

        /// Bytes used by every entry except `excluded_key`.
        pub async fn usage_bytes(&self, excluded_key: &str) -> Result<usize, StorageError> {
            let conn = self.conn.lock().await;
            Self::usage_with(&conn, excluded_key)
        }

        fn usage_with(conn: &Connection, excluded_key: &str) -> Result<usize, StorageError> {
            let used: i64 = conn.query_row(
                "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0)
                 FROM storage WHERE key != ?",
                [excluded_key],
                |row| row.get(0),
            )?;
            Ok(usize::try_from(used).unwrap_or(usize::MAX))
        }

        pub async fn keys(&self) -> Result<Vec<String>, StorageError> {
            let conn = self.conn.lock().await;
            let mut stmt = conn.prepare("SELECT key FROM storage ORDER BY key")?;
            let keys: Result<Vec<String>, rusqlite::Error> =
                stmt.query_map([], |row| row.get(0))?.collect();
            Ok(keys?)
        }
    }

    #[async_trait]
    impl LocalStorage for Database {
        async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            let conn = self.conn.lock().await;
            let value = conn
                .query_row("SELECT value FROM storage WHERE key = ?", [key], |row| {
                    row.get::<_, String>(0)
                })
                .optional()?;
            debug!("[DB] get {} -> {}", key, if value.is_some() { "hit" } else { "miss" });
            Ok(value)
        }

        async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
            let mut conn = self.conn.lock().await;
            let tx = conn.transaction()?;

            let used_by_others = Self::usage_with(&tx, key)?;
            check_quota(self.quota, used_by_others, key, value)?;

            tx.execute(
                "INSERT INTO storage (key, value) VALUES (?, ?)
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = CURRENT_TIMESTAMP",
                rusqlite::params![key, value],
            )?;
            tx.commit()?;
            debug!("[DB] set {} ({} bytes)", key, value.len());
            Ok(())
        }

        async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
            let conn = self.conn.lock().await;
            conn.execute("DELETE FROM storage WHERE key = ?", [key])?;
            debug!("[DB] removed {}", key);
            Ok(())
        }
    }
}

#[cfg(feature = "sqlite")]
pub use db_impl::Database;
