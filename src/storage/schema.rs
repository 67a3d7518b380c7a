use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::types::{is_lock_message, PersistenceError};

// ============================================================================
// Database
// ============================================================================

/// Handle to the favorites database.
///
/// Open once at startup and clone it into every component that needs it;
/// clones share one pool and one writer lock.
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
    /// Serializes every write issued through this handle.
    pub(crate) writer: Arc<Mutex<()>>,
}

impl Database {
    /// Open a database connection and run migrations
    ///
    /// Pass `":memory:"` for a throwaway database.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::InstanceLocked` if another process has the
    /// database locked, `PersistenceError::Migration` if the schema could not
    /// be created, and `PersistenceError::Other` for anything else.
    pub async fn open(path: &str) -> Result<Self, PersistenceError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // Create the file with user-only permissions before SQLite touches it
        #[cfg(unix)]
        if path != ":memory:" {
            use std::os::unix::fs::PermissionsExt;
            let db_path = std::path::Path::new(path);
            if db_path.exists() {
                let perms = std::fs::Permissions::from_mode(0o600);
                if let Err(e) = std::fs::set_permissions(path, perms) {
                    tracing::warn!(path = %path, error = %e, "Failed to set database file permissions");
                }
            } else if let Some(parent) = db_path.parent() {
                if parent.exists() {
                    use std::os::unix::fs::OpenOptionsExt;
                    let _file = std::fs::OpenOptions::new()
                        .write(true)
                        .create_new(true)
                        .mode(0o600)
                        .open(db_path)
                        .ok(); // If creation fails, SQLite will report the error at connect_with.
                }
            }
        }

        // busy_timeout=5000: wait up to 5 seconds for a competing writer.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(PersistenceError::from_open)?
            .pragma("busy_timeout", "5000");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(PersistenceError::from_open)?;
        let db = Self {
            pool,
            writer: Arc::new(Mutex::new(())),
        };
        db.migrate().await.map_err(|e| {
            if is_lock_message(&e.to_string()) {
                PersistenceError::InstanceLocked
            } else {
                PersistenceError::Migration(e.to_string())
            }
        })?;
        tracing::debug!(path = %path, "Favorites database ready");
        Ok(db)
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// Every statement uses `IF NOT EXISTS`, so re-running on an existing
    /// database is a no-op.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS favorites (
                id TEXT PRIMARY KEY NOT NULL,
                title TEXT NOT NULL,
                content TEXT,
                published_date INTEGER, -- Unix milliseconds
                url TEXT NOT NULL,
                author TEXT,
                url_to_image TEXT,
                popularity INTEGER
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_favorites_published ON favorites(published_date DESC)",
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Close the pool; later calls on any clone of this handle fail.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
