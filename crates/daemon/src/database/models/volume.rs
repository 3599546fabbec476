use serde::{Deserialize, Serialize};
use sqlx::Row;
use time::OffsetDateTime;

use crate::database::Database;

/// A named binding of a remote folder path to a local mountpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub name: String,
    /// Slash separated path below the drive root
    pub remote_path: String,
    pub mount_point: String,
    pub created_at: OffsetDateTime,
}

impl Database {
    /// Create a volume record, replacing the path and mountpoint of an
    /// existing volume with the same name
    pub async fn create_volume(
        &self,
        name: &str,
        remote_path: &str,
        mount_point: &str,
    ) -> Result<Volume, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO volumes (name, remote_path, mount_point, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(name) DO UPDATE SET
                remote_path = excluded.remote_path,
                mount_point = excluded.mount_point
            "#,
        )
        .bind(name)
        .bind(remote_path)
        .bind(mount_point)
        .bind(OffsetDateTime::now_utc())
        .execute(&**self)
        .await?;

        self.get_volume(name).await?.ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn get_volume(&self, name: &str) -> Result<Option<Volume>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT name, remote_path, mount_point, created_at
            FROM volumes
            WHERE name = ?1
            "#,
        )
        .bind(name)
        .fetch_optional(&**self)
        .await?;

        Ok(row.map(|r| row_to_volume(&r)))
    }

    /// List all volumes, oldest first
    pub async fn list_volumes(&self) -> Result<Vec<Volume>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT name, remote_path, mount_point, created_at
            FROM volumes
            ORDER BY created_at ASC, name ASC
            "#,
        )
        .fetch_all(&**self)
        .await?;

        Ok(rows.iter().map(row_to_volume).collect())
    }

    /// Delete a volume record, returning whether it existed
    pub async fn delete_volume(&self, name: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM volumes WHERE name = ?1")
            .bind(name)
            .execute(&**self)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_volume(row: &sqlx::sqlite::SqliteRow) -> Volume {
    Volume {
        name: row.get("name"),
        remote_path: row.get("remote_path"),
        mount_point: row.get("mount_point"),
        created_at: row.get("created_at"),
    }
}
