//! SQLite database for volume records

use std::ops::Deref;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use url::Url;

pub mod models;

/// Connection pool for the daemon's volume records
#[derive(Debug, Clone)]
pub struct Database(SqlitePool);

impl Deref for Database {
    type Target = SqlitePool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseSetupError {
    #[error("invalid database url: {0}")]
    InvalidUrl(String),
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

impl Database {
    /// Connect to `sqlite://<path>` (created if missing) or `sqlite::memory:`
    pub async fn connect(url: &Url) -> Result<Self, DatabaseSetupError> {
        let in_memory = url.as_str().contains(":memory:");
        let options: SqliteConnectOptions = url
            .as_str()
            .parse::<SqliteConnectOptions>()
            .map_err(|e| DatabaseSetupError::InvalidUrl(e.to_string()))?
            .create_if_missing(true);

        // Every connection to :memory: is a distinct database
        let max_connections = if in_memory { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let db = Self(pool);
        db.create_schema().await?;
        tracing::debug!(url = %url, "volume database ready");
        Ok(db)
    }

    async fn create_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS volumes (
                name TEXT PRIMARY KEY,
                remote_path TEXT NOT NULL,
                mount_point TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&**self)
        .await?;
        Ok(())
    }
}
