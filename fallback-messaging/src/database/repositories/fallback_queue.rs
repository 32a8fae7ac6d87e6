//! Fallback delay queue.
//!
//! A task becomes receivable once `visible_at` has passed. Receiving a task
//! does not remove it: its `visible_at` moves forward by the visibility
//! timeout, so a consumer that dies before acknowledging lets it reappear.
//! Delivery is therefore at-least-once.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::Result;
use crate::database::models::{FallbackDeadLetterDbModel, FallbackTaskDbModel};
use crate::database::time::{ms_after, now_ms};
use crate::delivery::{FallbackScheduler, FallbackTask};

/// Consumer side of the fallback queue.
#[async_trait]
pub trait FallbackQueueRepository: Send + Sync {
    /// Insert a raw payload that becomes visible after `delay`.
    async fn enqueue(&self, message_id: &str, payload: &str, delay: Duration) -> Result<i64>;

    /// Claim up to `limit` visible tasks, hiding them for `visibility_timeout`.
    async fn receive(
        &self,
        limit: u32,
        visibility_timeout: Duration,
    ) -> Result<Vec<FallbackTaskDbModel>>;

    /// Remove a processed task.
    async fn ack(&self, id: i64) -> Result<()>;

    /// Move a task to the dead-letter table.
    async fn dead_letter(&self, task: &FallbackTaskDbModel, reason: &str) -> Result<()>;

    async fn list_dead_letters(&self, limit: u32) -> Result<Vec<FallbackDeadLetterDbModel>>;

    /// Tasks not yet acknowledged, visible or not.
    async fn pending_count(&self) -> Result<i64>;
}

/// SQLite-backed fallback queue.
#[derive(Clone)]
pub struct SqlxFallbackQueue {
    pool: SqlitePool,
}

impl SqlxFallbackQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FallbackQueueRepository for SqlxFallbackQueue {
    async fn enqueue(&self, message_id: &str, payload: &str, delay: Duration) -> Result<i64> {
        let now = now_ms();
        let result = sqlx::query(
            r#"
            INSERT INTO fallback_task (message_id, payload, visible_at, receive_count, enqueued_at)
            VALUES (?, ?, ?, 0, ?)
            "#,
        )
        .bind(message_id)
        .bind(payload)
        .bind(ms_after(delay))
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn receive(
        &self,
        limit: u32,
        visibility_timeout: Duration,
    ) -> Result<Vec<FallbackTaskDbModel>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        // Single statement so concurrent receivers never claim the same task.
        let mut tasks = sqlx::query_as::<_, FallbackTaskDbModel>(
            r#"
            UPDATE fallback_task
            SET receive_count = receive_count + 1,
                visible_at = ?
            WHERE id IN (
                SELECT id FROM fallback_task
                WHERE visible_at <= ?
                ORDER BY visible_at, id
                LIMIT ?
            )
            RETURNING *
            "#,
        )
        .bind(ms_after(visibility_timeout))
        .bind(now_ms())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        tasks.sort_by_key(|t| t.id);
        if !tasks.is_empty() {
            debug!(count = tasks.len(), "Received fallback tasks");
        }
        Ok(tasks)
    }

    async fn ack(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM fallback_task WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn dead_letter(&self, task: &FallbackTaskDbModel, reason: &str) -> Result<()> {
        let entry = FallbackDeadLetterDbModel::from_task(task, reason);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO fallback_dead_letter (
                id, message_id, payload, receive_count, error_message, enqueued_at, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.message_id)
        .bind(&entry.payload)
        .bind(entry.receive_count)
        .bind(&entry.error_message)
        .bind(entry.enqueued_at)
        .bind(entry.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM fallback_task WHERE id = ?")
            .bind(task.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        warn!(
            message_id = %task.message_id,
            receive_count = task.receive_count,
            "Fallback task moved to dead letters: {}",
            reason
        );
        Ok(())
    }

    async fn list_dead_letters(&self, limit: u32) -> Result<Vec<FallbackDeadLetterDbModel>> {
        let entries = sqlx::query_as::<_, FallbackDeadLetterDbModel>(
            "SELECT * FROM fallback_dead_letter ORDER BY created_at DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn pending_count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM fallback_task")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl FallbackScheduler for SqlxFallbackQueue {
    async fn schedule(&self, task: &FallbackTask, delay: Duration) -> Result<()> {
        let payload = serde_json::to_string(task)?;
        let id = self.enqueue(&task.message_id, &payload, delay).await?;
        debug!(message_id = %task.message_id, task_id = id, delay_secs = delay.as_secs(), "Scheduled fallback evaluation");
        Ok(())
    }
}
