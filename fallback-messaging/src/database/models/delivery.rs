//! Delivery record database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

use crate::channels::ChannelSpec;
use crate::database::time::now_ms;

/// Delivery status of a primary message.
///
/// `Sent` is the only non-terminal value; both writers move away from it
/// exactly once in the normal case. Stored in its `Display` form.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    SentFallback,
}

/// Delivery record database model.
/// One row per `fallback` use-case notification, keyed by the primary send's
/// message id.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DeliveryRecordDbModel {
    pub message_id: String,
    pub recipient: String,
    pub sender: String,
    /// JSON of the primary channel content
    pub message: String,
    pub primary_channel: String,
    pub use_case: String,
    pub fallback_channel: String,
    pub status: String,
    /// Unix epoch milliseconds
    pub primary_sent_at: i64,
    pub fallback_sent_at: Option<i64>,
    /// JSON snapshot of the fallback channel spec
    pub fallback_body: String,
}

impl DeliveryRecordDbModel {
    /// Build the initial `sent` record for a primary message.
    pub fn new_sent(
        message_id: impl Into<String>,
        use_case: impl Into<String>,
        primary: &ChannelSpec,
        fallback: &ChannelSpec,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            message_id: message_id.into(),
            recipient: primary.recipient.clone(),
            sender: primary.sender.clone(),
            message: primary.content.to_json()?.to_string(),
            primary_channel: primary.channel().to_string(),
            use_case: use_case.into(),
            fallback_channel: fallback.channel().to_string(),
            status: DeliveryStatus::Sent.to_string(),
            primary_sent_at: now_ms(),
            fallback_sent_at: None,
            fallback_body: serde_json::to_string(fallback)?,
        })
    }

    /// Parsed status; `None` for values this version does not know.
    pub fn delivery_status(&self) -> Option<DeliveryStatus> {
        DeliveryStatus::from_str(&self.status).ok()
    }

    pub fn is_delivered(&self) -> bool {
        self.delivery_status() == Some(DeliveryStatus::Delivered)
    }
}
