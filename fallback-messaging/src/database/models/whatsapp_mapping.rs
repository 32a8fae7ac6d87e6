//! WhatsApp id mapping database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Correlates the id WhatsApp assigns to a message with the internal message
/// id the delivery record is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct WhatsAppMappingDbModel {
    pub provider_message_id: String,
    pub message_id: String,
    pub created_at: i64,
}

impl WhatsAppMappingDbModel {
    pub fn new(provider_message_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            provider_message_id: provider_message_id.into(),
            message_id: message_id.into(),
            created_at: crate::database::time::now_ms(),
        }
    }
}
