//! Conversation storage addressed by opaque ids with an explicit TTL.
//!
//! Backed by SQLite rather than process-wide mutable state: each
//! conversation row carries an `expires_at` that slides forward on every
//! save, and expired rows are invisible to reads until the sweeper
//! removes them.

use std::path::Path;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};

use crate::core::errors::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: String,
    pub content: String,
    pub timestamp: String,
}

impl ConversationMessage {
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
            timestamp: now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub messages: Vec<ConversationMessage>,
    pub created_at: String,
    pub updated_at: String,
    pub expires_at: String,
}

#[derive(Clone)]
pub struct ConversationStore {
    pool: SqlitePool,
    ttl: Duration,
}

impl ConversationStore {
    pub async fn new(db_path: &Path, ttl: Duration) -> Result<Self, ApiError> {
        if let Some(parent) = db_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| {
                ApiError::Internal(format!("failed to connect to conversation db: {e}"))
            })?;

        let store = Self { pool, ttl };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                messages JSON NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_conversations_expires ON conversations(expires_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    /// Appends an exchange and slides the TTL forward. Creates the
    /// conversation when it does not exist or has already expired.
    pub async fn append(
        &self,
        id: &str,
        new_messages: Vec<ConversationMessage>,
    ) -> Result<(), ApiError> {
        let stamp = now();
        let expires_at = expiry(self.ttl);

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        let existing: Option<String> =
            sqlx::query("SELECT messages FROM conversations WHERE id = ? AND expires_at > ?")
                .bind(id)
                .bind(&stamp)
                .fetch_optional(&mut *tx)
                .await
                .map_err(ApiError::internal)?
                .map(|row| row.get(0));

        let mut messages: Vec<ConversationMessage> = match existing {
            Some(raw) => serde_json::from_str(&raw).map_err(ApiError::internal)?,
            None => Vec::new(),
        };
        messages.extend(new_messages);
        let payload = serde_json::to_string(&messages).map_err(ApiError::internal)?;

        sqlx::query(
            "INSERT INTO conversations (id, messages, created_at, updated_at, expires_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                messages = excluded.messages,
                updated_at = excluded.updated_at,
                expires_at = excluded.expires_at",
        )
        .bind(id)
        .bind(&payload)
        .bind(&stamp)
        .bind(&stamp)
        .bind(&expires_at)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::internal)?;

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(())
    }

    /// Returns None for unknown or expired conversations.
    pub async fn get(&self, id: &str) -> Result<Option<Conversation>, ApiError> {
        let row = sqlx::query(
            "SELECT id, messages, created_at, updated_at, expires_at
             FROM conversations WHERE id = ? AND expires_at > ?",
        )
        .bind(id)
        .bind(now())
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String = row.get("messages");
        let messages = serde_json::from_str(&raw).map_err(ApiError::internal)?;
        Ok(Some(Conversation {
            id: row.get("id"),
            messages,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            expires_at: row.get("expires_at"),
        }))
    }

    pub async fn delete(&self, id: &str) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn purge_expired(&self) -> Result<u64, ApiError> {
        let result = sqlx::query("DELETE FROM conversations WHERE expires_at <= ?")
            .bind(now())
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(result.rows_affected())
    }

    /// Background sweep of expired rows; reads already ignore them, the
    /// sweep just reclaims space.
    pub fn spawn_sweeper(&self, interval: Duration) {
        let store = self.clone();
        let interval = interval.max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match store.purge_expired().await {
                    Ok(0) => {}
                    Ok(n) => tracing::info!("purged {} expired conversations", n),
                    Err(e) => tracing::warn!("conversation sweep failed: {}", e),
                }
            }
        });
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn expiry(ttl: Duration) -> String {
    (Utc::now() + ttl).to_rfc3339_opts(SecondsFormat::Secs, true)
}
