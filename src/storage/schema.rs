use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::{is_lock_error, DatabaseError};

// ============================================================================
// Database
// ============================================================================

/// Handle on one collection's database file.
///
/// Operations are sequential, so the pool holds a single connection. That
/// also keeps `:memory:` databases coherent across queries.
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) a database and run migrations
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Locked` if another process holds the lock past
    /// the busy timeout, `DatabaseError::Migration` if the schema cannot be
    /// created, and `DatabaseError::Other` for anything else.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // busy_timeout=5000: SQLite waits up to 5 seconds for locks to release
        // before returning SQLITE_BUSY.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(DatabaseError::from_sqlx)?
            .pragma("busy_timeout", "5000");
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        let db = Self { pool };
        db.migrate().await.map_err(|e| {
            if is_lock_error(&e.to_string()) {
                DatabaseError::Locked
            } else {
                DatabaseError::Migration(e.to_string())
            }
        })?;
        tracing::debug!(path = %path, "Opened database");
        Ok(db)
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// All statements use `IF NOT EXISTS`, so re-running on an existing
    /// database is a no-op.
    async fn migrate(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS channels (
                link TEXT PRIMARY KEY,
                title TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                feed_link TEXT NOT NULL DEFAULT '',
                links TEXT NOT NULL DEFAULT '',
                updated TEXT NOT NULL DEFAULT '',
                published TEXT NOT NULL DEFAULT '',
                authors TEXT NOT NULL DEFAULT '',
                language TEXT NOT NULL DEFAULT '',
                copyright TEXT NOT NULL DEFAULT '',
                generator TEXT NOT NULL DEFAULT '',
                categories TEXT NOT NULL DEFAULT '',
                feed_type TEXT NOT NULL DEFAULT '',
                feed_version TEXT NOT NULL DEFAULT ''
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                link TEXT PRIMARY KEY,
                postPath TEXT NOT NULL DEFAULT '',
                title TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                authors TEXT NOT NULL DEFAULT '',
                enclosures TEXT NOT NULL DEFAULT '',
                guid TEXT NOT NULL DEFAULT '',
                pubDate TEXT NOT NULL DEFAULT '',
                dcExt TEXT NOT NULL DEFAULT '',
                channel TEXT NOT NULL DEFAULT '',
                sourceMarkdown TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT '',
                label TEXT NOT NULL DEFAULT '',
                updated TEXT NOT NULL DEFAULT ''
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pages (
                inputPath TEXT PRIMARY KEY,
                outputPath TEXT NOT NULL DEFAULT '',
                updated TEXT NOT NULL DEFAULT ''
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Generator ordering and filter predicates
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_items_status_pubdate ON items(status, pubDate DESC)",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_post_path ON items(postPath)")
            .execute(&mut *tx)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_channel ON items(channel)")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Close the pool, flushing the file to disk.
    pub async fn close(self) {
        self.pool.close().await;
    }
}
