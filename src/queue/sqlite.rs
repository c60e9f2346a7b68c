//! SQLite-backed queue
//!
//! All named queues share one `queue_messages` table. A delivery is claimed
//! with a conditional update, so several worker processes can poll the same
//! database without receiving the same message twice within its visibility
//! timeout.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{sqlite::{SqlitePool, SqlitePoolOptions}, Row};
use tracing::{debug, info};
use uuid::Uuid;

use super::traits::{JobQueue, QueueMessage};
use crate::error::QueueError;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Connection to the queue database
#[derive(Clone)]
pub struct SqliteQueueStore {
    pool: SqlitePool,
}

impl SqliteQueueStore {
    /// Open (or create) the queue database
    pub async fn connect(db_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let database_url = format!("sqlite:{}?mode=rwc", db_path);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .context("Failed to connect to SQLite queue database")?;

        let store = Self { pool };
        store.initialize().await?;
        info!("SQLite queue database ready at: {}", db_path);

        Ok(store)
    }

    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS queue_messages (
                message_id TEXT PRIMARY KEY,
                queue TEXT NOT NULL,
                body TEXT NOT NULL,
                receive_count INTEGER NOT NULL DEFAULT 0,
                receipt_handle TEXT,
                visible_at INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_queue_messages_visible
            ON queue_messages(queue, visible_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Handle to one named queue
    pub fn queue(&self, name: &str, visibility_timeout: Duration) -> SqliteQueue {
        SqliteQueue {
            pool: self.pool.clone(),
            name: name.to_string(),
            visibility_timeout,
        }
    }
}

/// A named queue inside the shared database
pub struct SqliteQueue {
    pool: SqlitePool,
    name: String,
    visibility_timeout: Duration,
}

impl SqliteQueue {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Messages still in this queue, visible or not
    pub async fn count(&self) -> Result<i64, QueueError> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM queue_messages WHERE queue = ?")
            .bind(&self.name)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("count"))
    }

    async fn try_claim(&self) -> Result<Option<QueueMessage>, QueueError> {
        loop {
            let now = now_millis();
            let row = sqlx::query(
                r#"
                SELECT message_id, body, receive_count
                FROM queue_messages
                WHERE queue = ? AND visible_at <= ?
                ORDER BY created_at, rowid
                LIMIT 1
                "#,
            )
            .bind(&self.name)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

            let Some(row) = row else {
                return Ok(None);
            };

            let message_id: String = row.get("message_id");
            let receive_count: i64 = row.get("receive_count");
            let receipt = Uuid::new_v4().to_string();
            let hidden_until = now + self.visibility_timeout.as_millis() as i64;

            let claimed = sqlx::query(
                r#"
                UPDATE queue_messages
                SET receipt_handle = ?, receive_count = receive_count + 1, visible_at = ?
                WHERE message_id = ? AND visible_at <= ?
                "#,
            )
            .bind(&receipt)
            .bind(hidden_until)
            .bind(&message_id)
            .bind(now)
            .execute(&self.pool)
            .await?;

            if claimed.rows_affected() == 1 {
                return Ok(Some(QueueMessage {
                    message_id,
                    receipt_handle: receipt,
                    body: row.get("body"),
                    receive_count: (receive_count + 1) as u32,
                }));
            }

            // Another consumer claimed it between select and update
            debug!("Lost race for message {} on {}", message_id, self.name);
        }
    }
}

#[async_trait]
impl JobQueue for SqliteQueue {
    async fn receive(&self, wait: Duration) -> Result<Option<QueueMessage>, QueueError> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(message) = self.try_claim().await? {
                return Ok(Some(message));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            tokio::time::sleep(remaining.min(POLL_INTERVAL)).await;
        }
    }

    async fn send(&self, body: &str) -> Result<(), QueueError> {
        let now = now_millis();
        sqlx::query(
            r#"
            INSERT INTO queue_messages (message_id, queue, body, receive_count, visible_at, created_at)
            VALUES (?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&self.name)
        .bind(body)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        let result = sqlx::query("DELETE FROM queue_messages WHERE queue = ? AND receipt_handle = ?")
            .bind(&self.name)
            .bind(receipt_handle)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::InvalidReceipt(receipt_handle.to_string()));
        }
        Ok(())
    }
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
