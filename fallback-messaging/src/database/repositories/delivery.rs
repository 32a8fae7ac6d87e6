//! Delivery record repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::{DeliveryRecordDbModel, DeliveryStatus};
use crate::{Error, Result};

/// Delivery record repository trait.
#[async_trait]
pub trait DeliveryRecordRepository: Send + Sync {
    async fn get_record(&self, message_id: &str) -> Result<DeliveryRecordDbModel>;
    async fn record_exists(&self, message_id: &str) -> Result<bool>;
    async fn create_record(&self, record: &DeliveryRecordDbModel) -> Result<()>;

    /// Set status to `delivered`. Existence-gated: fails with `NotFound` and
    /// writes nothing when the record is absent.
    async fn mark_delivered(&self, message_id: &str) -> Result<()>;

    /// Set status to `sent_fallback` and stamp the fallback time, whatever
    /// the current status is.
    async fn mark_sent_fallback(&self, message_id: &str, sent_at: i64) -> Result<()>;
}

/// SQLx implementation of DeliveryRecordRepository.
pub struct SqlxDeliveryRecordRepository {
    pool: SqlitePool,
}

impl SqlxDeliveryRecordRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliveryRecordRepository for SqlxDeliveryRecordRepository {
    async fn get_record(&self, message_id: &str) -> Result<DeliveryRecordDbModel> {
        sqlx::query_as::<_, DeliveryRecordDbModel>(
            "SELECT * FROM delivery_record WHERE message_id = ?",
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::not_found("DeliveryRecord", message_id))
    }

    async fn record_exists(&self, message_id: &str) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM delivery_record WHERE message_id = ?")
                .bind(message_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    async fn create_record(&self, record: &DeliveryRecordDbModel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO delivery_record (
                message_id, recipient, sender, message, primary_channel, use_case,
                fallback_channel, status, primary_sent_at, fallback_sent_at, fallback_body
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.message_id)
        .bind(&record.recipient)
        .bind(&record.sender)
        .bind(&record.message)
        .bind(&record.primary_channel)
        .bind(&record.use_case)
        .bind(&record.fallback_channel)
        .bind(&record.status)
        .bind(record.primary_sent_at)
        .bind(record.fallback_sent_at)
        .bind(&record.fallback_body)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_delivered(&self, message_id: &str) -> Result<()> {
        let result = sqlx::query("UPDATE delivery_record SET status = ? WHERE message_id = ?")
            .bind(DeliveryStatus::Delivered.to_string())
            .bind(message_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("DeliveryRecord", message_id));
        }
        Ok(())
    }

    async fn mark_sent_fallback(&self, message_id: &str, sent_at: i64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE delivery_record SET status = ?, fallback_sent_at = ? WHERE message_id = ?",
        )
        .bind(DeliveryStatus::SentFallback.to_string())
        .bind(sent_at)
        .bind(message_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!(message_id, "No delivery record to mark as sent_fallback");
        }
        Ok(())
    }
}
