//! SMS delivery events.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{ConfirmationNormalizer, ConfirmationOutcome, apply_delivered, unwrap_envelope};
use crate::channels::Channel;
use crate::database::repositories::DeliveryRecordRepository;
use crate::{Error, Result};

/// Event types that mean the handset has the message.
const DELIVERED_EVENTS: [&str; 2] = ["TEXT_SUCCESSFUL", "TEXT_DELIVERED"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SmsEvent {
    event_type: String,
    #[serde(default)]
    message_id: Option<String>,
}

/// Handles `{eventType, messageId}` events.
pub struct SmsConfirmation {
    records: Arc<dyn DeliveryRecordRepository>,
}

impl SmsConfirmation {
    pub fn new(records: Arc<dyn DeliveryRecordRepository>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl ConfirmationNormalizer for SmsConfirmation {
    fn channel(&self) -> Channel {
        Channel::Sms
    }

    async fn handle(&self, event: Value) -> Result<ConfirmationOutcome> {
        let event: SmsEvent = serde_json::from_value(unwrap_envelope(event)?)
            .map_err(|e| Error::malformed(format!("sms event: {e}")))?;

        if !DELIVERED_EVENTS.contains(&event.event_type.as_str()) {
            return Ok(ConfirmationOutcome::ignored(format!(
                "sms event type {} is not a delivery",
                event.event_type
            )));
        }

        let message_id = event
            .message_id
            .ok_or_else(|| Error::malformed("sms delivery event without messageId"))?;
        apply_delivered(self.records.as_ref(), Channel::Sms, &message_id).await
    }
}
