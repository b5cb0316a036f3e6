// SQLite-backed moderation store.
//
// Tables:
// - warnings: append-only log, no primary key
// - blocked_users: mod-mail block list, one row per user

use crate::core::moderation::{ModerationError, ModerationStore, WarningRecord};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

pub struct SqliteModerationStore {
    pool: Pool<Sqlite>,
}

impl SqliteModerationStore {
    /// Open (creating if needed) the database file and run migrations.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure the file exists if it's a file path
        let path_str = database_url.trim_start_matches("sqlite://");
        if !database_url.contains(":memory:") && !Path::new(path_str).exists() {
            if let Some(parent) = Path::new(path_str).parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::File::create(path_str)?;
        }

        let conn_str = if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            format!("sqlite://{}", database_url)
        };

        // Statements are independent and auto-committed; SQLite serialises
        // the writers, so a handful of connections is plenty.
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&conn_str)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), ModerationError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS warnings (
                user_id INTEGER,
                guild_id INTEGER,
                reason TEXT,
                time TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS blocked_users (
                user_id INTEGER PRIMARY KEY
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl ModerationStore for SqliteModerationStore {
    async fn record_warning(&self, record: WarningRecord) -> Result<(), ModerationError> {
        sqlx::query("INSERT INTO warnings (user_id, guild_id, reason, time) VALUES (?, ?, ?, ?)")
            .bind(record.user_id as i64)
            .bind(record.guild_id as i64)
            .bind(&record.reason)
            .bind(record.time.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| ModerationError::StorageError(e.to_string()))?;
        Ok(())
    }

    async fn list_warnings(
        &self,
        user_id: u64,
        guild_id: u64,
    ) -> Result<Vec<String>, ModerationError> {
        // rowid keeps insertion order without a timestamp sort
        let rows = sqlx::query(
            "SELECT reason FROM warnings WHERE user_id = ? AND guild_id = ? ORDER BY rowid",
        )
        .bind(user_id as i64)
        .bind(guild_id as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| {
                row.get::<Option<String>, _>("reason")
                    .unwrap_or_default()
            })
            .collect())
    }

    async fn clear_warnings(&self, user_id: u64, guild_id: u64) -> Result<(), ModerationError> {
        sqlx::query("DELETE FROM warnings WHERE user_id = ? AND guild_id = ?")
            .bind(user_id as i64)
            .bind(guild_id as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| ModerationError::StorageError(e.to_string()))?;
        Ok(())
    }

    async fn block_user(&self, user_id: u64) -> Result<(), ModerationError> {
        sqlx::query("INSERT OR IGNORE INTO blocked_users (user_id) VALUES (?)")
            .bind(user_id as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| ModerationError::StorageError(e.to_string()))?;
        Ok(())
    }

    async fn unblock_user(&self, user_id: u64) -> Result<(), ModerationError> {
        sqlx::query("DELETE FROM blocked_users WHERE user_id = ?")
            .bind(user_id as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| ModerationError::StorageError(e.to_string()))?;
        Ok(())
    }

    async fn is_blocked(&self, user_id: u64) -> Result<bool, ModerationError> {
        let row = sqlx::query("SELECT user_id FROM blocked_users WHERE user_id = ?")
            .bind(user_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        Ok(row.is_some())
    }
}
