//! Delivery confirmation normalizers.
//!
//! Each provider reports delivery in its own event format. A normalizer
//! turns one event into at most one status transition on the delivery
//! record store:
//! - Email: `Delivery` events.
//! - SMS: `TEXT_SUCCESSFUL` and `TEXT_DELIVERED` events.
//! - WhatsApp: `accepted` stores an id mapping, `delivered` resolves it.
//!
//! Events may arrive bare or wrapped in an SNS envelope; see
//! [`unwrap_envelope`].

mod email;
mod sms;
mod whatsapp;

pub use email::EmailConfirmation;
pub use sms::SmsConfirmation;
pub use whatsapp::WhatsAppConfirmation;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::channels::Channel;
use crate::database::repositories::DeliveryRecordRepository;
use crate::{Error, Result};

/// Result of a handled event. Missing records, store failures and malformed
/// payloads come back as errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConfirmationOutcome {
    /// The record moved to `delivered`.
    Delivered { message_id: String },
    /// WhatsApp accepted phase: provider id now resolves to the internal id.
    MappingStored {
        provider_message_id: String,
        message_id: String,
    },
    /// Not a delivery signal; acknowledged and dropped.
    Ignored { reason: String },
}

impl ConfirmationOutcome {
    pub(crate) fn ignored(reason: impl Into<String>) -> Self {
        Self::Ignored {
            reason: reason.into(),
        }
    }
}

/// Translates one provider event into a status update.
#[async_trait]
pub trait ConfirmationNormalizer: Send + Sync {
    fn channel(&self) -> Channel;

    async fn handle(&self, event: Value) -> Result<ConfirmationOutcome>;
}

/// Strip an SNS envelope if there is one.
///
/// Accepts an SNS-to-function delivery (`Records[0].Sns.Message`), an SNS
/// HTTP notification (`{"Type": "Notification", "Message": ...}`) or the bare
/// event. The inner message is a JSON-encoded string.
pub fn unwrap_envelope(event: Value) -> Result<Value> {
    if let Some(records) = event.get("Records") {
        let message = records
            .get(0)
            .and_then(|r| r.get("Sns"))
            .and_then(|sns| sns.get("Message"))
            .ok_or_else(|| Error::malformed("SNS record without Sns.Message"))?;
        return decode_embedded(message, "Sns.Message");
    }

    if event.get("Type").and_then(Value::as_str) == Some("Notification") {
        let message = event
            .get("Message")
            .ok_or_else(|| Error::malformed("SNS notification without Message"))?;
        return decode_embedded(message, "Message");
    }

    Ok(event)
}

/// Decode a field that carries JSON either inline or as an encoded string.
pub(crate) fn decode_embedded(value: &Value, field: &str) -> Result<Value> {
    match value {
        Value::String(s) => serde_json::from_str(s)
            .map_err(|e| Error::malformed(format!("{field} is not valid JSON: {e}"))),
        Value::Object(_) => Ok(value.clone()),
        _ => Err(Error::malformed(format!("{field} is not a JSON object"))),
    }
}

/// Existence-gated `delivered` update shared by all channels.
pub(crate) async fn apply_delivered(
    records: &dyn DeliveryRecordRepository,
    channel: Channel,
    message_id: &str,
) -> Result<ConfirmationOutcome> {
    records.mark_delivered(message_id).await?;
    info!(%channel, message_id, "Delivery confirmed");
    Ok(ConfirmationOutcome::Delivered {
        message_id: message_id.to_string(),
    })
}
