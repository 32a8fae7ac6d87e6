//! Fallback queue database models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A queued fallback evaluation.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FallbackTaskDbModel {
    pub id: i64,
    pub message_id: String,
    /// JSON of the fallback task payload
    pub payload: String,
    /// Unix epoch milliseconds at which the task becomes receivable
    pub visible_at: i64,
    /// Times the task has been handed to a consumer
    pub receive_count: i64,
    pub enqueued_at: i64,
}

/// A fallback task that was received too many times without being
/// acknowledged.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FallbackDeadLetterDbModel {
    pub id: String,
    pub message_id: String,
    pub payload: String,
    pub receive_count: i64,
    pub error_message: String,
    pub enqueued_at: i64,
    pub created_at: i64,
}

impl FallbackDeadLetterDbModel {
    pub fn from_task(task: &FallbackTaskDbModel, error_message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            message_id: task.message_id.clone(),
            payload: task.payload.clone(),
            receive_count: task.receive_count,
            error_message: error_message.into(),
            enqueued_at: task.enqueued_at,
            created_at: crate::database::time::now_ms(),
        }
    }
}
