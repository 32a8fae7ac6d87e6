//! WhatsApp channel.
//!
//! The provider wraps a Meta Cloud API message; `sender` is the origination
//! phone number id registered with the provider.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::{
    Channel, ChannelSender, DispatchResult, MessageRole, ProviderEndpoint, WhatsAppContent,
    post_for_message_id,
};

/// Default Meta API version.
pub const DEFAULT_META_API_VERSION: &str = "v20.0";

pub struct WhatsAppChannel {
    endpoint: ProviderEndpoint,
    client: Client,
    meta_api_version: String,
}

impl WhatsAppChannel {
    pub fn new(endpoint: ProviderEndpoint, client: Client, meta_api_version: impl Into<String>) -> Self {
        Self {
            endpoint,
            client,
            meta_api_version: meta_api_version.into(),
        }
    }

    /// Build the Meta-format text message.
    fn build_meta_message(recipient: &str, content: &WhatsAppContent) -> Value {
        json!({
            "messaging_product": "whatsapp",
            "type": "text",
            "preview_url": true,
            "to": recipient,
            "text": {"body": content.message}
        })
    }

    fn build_payload(&self, origination_id: &str, recipient: &str, content: &WhatsAppContent) -> Value {
        // The provider expects the Meta message as an opaque JSON string.
        let message = Self::build_meta_message(recipient, content).to_string();
        json!({
            "originationPhoneNumberId": origination_id,
            "message": message,
            "metaApiVersion": self.meta_api_version
        })
    }
}

#[async_trait]
impl ChannelSender for WhatsAppChannel {
    type Content = WhatsAppContent;

    async fn send(
        &self,
        sender: &str,
        recipient: &str,
        content: &WhatsAppContent,
        _role: MessageRole,
    ) -> DispatchResult {
        let payload = self.build_payload(sender, recipient, content);
        post_for_message_id(
            &self.client,
            &self.endpoint,
            Channel::WhatsApp,
            &payload,
            &["messageId", "MessageId"],
        )
        .await
    }
}
