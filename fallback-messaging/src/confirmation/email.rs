//! Email delivery events.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{ConfirmationNormalizer, ConfirmationOutcome, apply_delivered, unwrap_envelope};
use crate::channels::Channel;
use crate::database::repositories::DeliveryRecordRepository;
use crate::{Error, Result};

const DELIVERY_EVENT: &str = "Delivery";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailEvent {
    event_type: String,
    #[serde(default)]
    mail: Option<EmailMail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailMail {
    message_id: String,
}

/// Handles `{eventType, mail: {messageId}}` events.
pub struct EmailConfirmation {
    records: Arc<dyn DeliveryRecordRepository>,
}

impl EmailConfirmation {
    pub fn new(records: Arc<dyn DeliveryRecordRepository>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl ConfirmationNormalizer for EmailConfirmation {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn handle(&self, event: Value) -> Result<ConfirmationOutcome> {
        let event: EmailEvent = serde_json::from_value(unwrap_envelope(event)?)
            .map_err(|e| Error::malformed(format!("email event: {e}")))?;

        if event.event_type != DELIVERY_EVENT {
            return Ok(ConfirmationOutcome::ignored(format!(
                "email event type {} is not a delivery",
                event.event_type
            )));
        }

        let mail = event
            .mail
            .ok_or_else(|| Error::malformed("email Delivery event without mail.messageId"))?;
        apply_delivered(self.records.as_ref(), Channel::Email, &mail.message_id).await
    }
}
