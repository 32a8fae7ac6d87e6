//! Notification submission and delivery state routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiResult;
use crate::api::server::AppState;
use crate::database::models::{DeliveryRecordDbModel, FallbackDeadLetterDbModel};
use crate::database::time::ms_to_datetime;
use crate::delivery::{DispatchOutcome, NotificationRequest};

const DEFAULT_DEAD_LETTER_LIMIT: u32 = 50;
const MAX_DEAD_LETTER_LIMIT: u32 = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(submit_message))
        .route("/dead-letters", get(list_dead_letters))
        .route("/{id}", get(get_message))
}

/// Delivery record as returned by the API.
#[derive(Debug, Serialize)]
pub struct DeliveryRecordResponse {
    pub message_id: String,
    pub status: String,
    pub use_case: String,
    pub primary_channel: String,
    pub fallback_channel: String,
    pub sender: String,
    pub recipient: String,
    pub message: serde_json::Value,
    pub primary_sent_at: DateTime<Utc>,
    pub fallback_sent_at: Option<DateTime<Utc>>,
}

impl From<DeliveryRecordDbModel> for DeliveryRecordResponse {
    fn from(record: DeliveryRecordDbModel) -> Self {
        let message = serde_json::from_str(&record.message)
            .unwrap_or(serde_json::Value::String(record.message));
        Self {
            message_id: record.message_id,
            status: record.status,
            use_case: record.use_case,
            primary_channel: record.primary_channel,
            fallback_channel: record.fallback_channel,
            sender: record.sender,
            recipient: record.recipient,
            message,
            primary_sent_at: ms_to_datetime(record.primary_sent_at),
            fallback_sent_at: record.fallback_sent_at.map(ms_to_datetime),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeadLetterResponse {
    pub id: String,
    pub message_id: String,
    pub receive_count: i64,
    pub error_message: String,
    pub payload: serde_json::Value,
    pub enqueued_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<FallbackDeadLetterDbModel> for DeadLetterResponse {
    fn from(entry: FallbackDeadLetterDbModel) -> Self {
        let payload = serde_json::from_str(&entry.payload)
            .unwrap_or(serde_json::Value::String(entry.payload));
        Self {
            id: entry.id,
            message_id: entry.message_id,
            receive_count: entry.receive_count,
            error_message: entry.error_message,
            payload,
            enqueued_at: ms_to_datetime(entry.enqueued_at),
            created_at: ms_to_datetime(entry.created_at),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DeadLetterQuery {
    pub limit: Option<u32>,
}

/// Send a notification. `202` once the primary (or both broadcast sends)
/// went out.
async fn submit_message(
    State(state): State<AppState>,
    Json(request): Json<NotificationRequest>,
) -> ApiResult<(StatusCode, Json<DispatchOutcome>)> {
    let outcome = state.dispatcher.dispatch(&request).await?;
    Ok((StatusCode::ACCEPTED, Json(outcome)))
}

async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeliveryRecordResponse>> {
    let record = state.records.get_record(&id).await?;
    Ok(Json(record.into()))
}

async fn list_dead_letters(
    State(state): State<AppState>,
    Query(query): Query<DeadLetterQuery>,
) -> ApiResult<Json<Vec<DeadLetterResponse>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_DEAD_LETTER_LIMIT)
        .clamp(1, MAX_DEAD_LETTER_LIMIT);
    let entries = state.fallback_queue.list_dead_letters(limit).await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}
