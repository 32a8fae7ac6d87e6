//! WhatsApp delivery events.
//!
//! WhatsApp assigns its own message id. The `accepted` status carries both
//! ids (the internal one echoed back as `messageId`), later statuses only the
//! provider id, so confirmation takes two phases:
//!
//! ```text
//! unconfirmed --accepted--> mapping stored --delivered--> record delivered
//!             --failed----> (no-op)
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::{
    ConfirmationNormalizer, ConfirmationOutcome, apply_delivered, decode_embedded,
    unwrap_envelope,
};
use crate::channels::Channel;
use crate::database::models::WhatsAppMappingDbModel;
use crate::database::repositories::{DeliveryRecordRepository, WhatsAppMappingRepository};
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WhatsAppEvent {
    /// Internal message id; present on the accepted phase.
    #[serde(default)]
    message_id: Option<String>,
    whats_app_webhook_entry: Value,
}

#[derive(Debug, Deserialize)]
struct WebhookEntry {
    #[serde(default)]
    changes: Vec<WebhookChange>,
}

#[derive(Debug, Deserialize)]
struct WebhookChange {
    field: String,
    #[serde(default)]
    value: WebhookValue,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookValue {
    #[serde(default)]
    statuses: Vec<WebhookStatus>,
}

#[derive(Debug, Deserialize)]
struct WebhookStatus {
    status: String,
    /// Provider message id.
    #[serde(default)]
    id: Option<String>,
}

/// Handles WhatsApp webhook status events.
pub struct WhatsAppConfirmation {
    records: Arc<dyn DeliveryRecordRepository>,
    mappings: Arc<dyn WhatsAppMappingRepository>,
}

impl WhatsAppConfirmation {
    pub fn new(
        records: Arc<dyn DeliveryRecordRepository>,
        mappings: Arc<dyn WhatsAppMappingRepository>,
    ) -> Self {
        Self { records, mappings }
    }

    async fn on_accepted(
        &self,
        message_id: Option<String>,
        provider_message_id: Option<String>,
    ) -> Result<ConfirmationOutcome> {
        let message_id =
            message_id.ok_or_else(|| Error::malformed("accepted status without messageId"))?;
        let provider_message_id = provider_message_id
            .ok_or_else(|| Error::malformed("accepted status without provider id"))?;

        if !self.records.record_exists(&message_id).await? {
            return Err(Error::not_found("DeliveryRecord", message_id));
        }

        self.mappings
            .put_mapping(&WhatsAppMappingDbModel::new(&provider_message_id, &message_id))
            .await?;
        info!(%message_id, %provider_message_id, "WhatsApp message accepted");

        Ok(ConfirmationOutcome::MappingStored {
            provider_message_id,
            message_id,
        })
    }

    async fn on_delivered(&self, provider_message_id: Option<String>) -> Result<ConfirmationOutcome> {
        let provider_message_id = provider_message_id
            .ok_or_else(|| Error::malformed("delivered status without provider id"))?;

        let message_id = self.mappings.get_message_id(&provider_message_id).await?;
        apply_delivered(self.records.as_ref(), Channel::WhatsApp, &message_id).await
    }
}

#[async_trait]
impl ConfirmationNormalizer for WhatsAppConfirmation {
    fn channel(&self) -> Channel {
        Channel::WhatsApp
    }

    async fn handle(&self, event: Value) -> Result<ConfirmationOutcome> {
        let event: WhatsAppEvent = serde_json::from_value(unwrap_envelope(event)?)
            .map_err(|e| Error::malformed(format!("whatsapp event: {e}")))?;

        let entry: WebhookEntry = serde_json::from_value(decode_embedded(
            &event.whats_app_webhook_entry,
            "whatsAppWebhookEntry",
        )?)
        .map_err(|e| Error::malformed(format!("whatsAppWebhookEntry: {e}")))?;

        let Some(change) = entry.changes.into_iter().next() else {
            return Ok(ConfirmationOutcome::ignored("webhook entry has no changes"));
        };
        if change.field != "messages" {
            return Ok(ConfirmationOutcome::ignored(format!(
                "webhook field {} is not messages",
                change.field
            )));
        }
        let Some(status) = change.value.statuses.into_iter().next() else {
            return Ok(ConfirmationOutcome::ignored("webhook change has no statuses"));
        };

        debug!(status = %status.status, provider_message_id = ?status.id, "WhatsApp status");

        match status.status.as_str() {
            "accepted" => self.on_accepted(event.message_id, status.id).await,
            "delivered" => self.on_delivered(status.id).await,
            "failed" => Ok(ConfirmationOutcome::ignored("whatsapp message failed")),
            other => Ok(ConfirmationOutcome::ignored(format!(
                "whatsapp status {other} needs no update"
            ))),
        }
    }
}
