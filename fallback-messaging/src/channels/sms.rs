//! SMS channel.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::{
    Channel, ChannelSender, DispatchResult, MessageRole, ProviderEndpoint, SmsContent,
    post_for_message_id,
};

/// SMS channel backed by a send-text-message HTTP API.
pub struct SmsChannel {
    endpoint: ProviderEndpoint,
    client: Client,
}

impl SmsChannel {
    pub fn new(endpoint: ProviderEndpoint, client: Client) -> Self {
        Self { endpoint, client }
    }

    fn build_payload(
        &self,
        sender: &str,
        recipient: &str,
        content: &SmsContent,
        role: MessageRole,
    ) -> Value {
        let mut payload = json!({
            "DestinationPhoneNumber": recipient,
            "OriginationIdentity": sender,
            "MessageBody": content.message,
            "MessageType": content.message_type,
            "Context": {"message_type": role.to_string()}
        });

        if let Some(configuration_set) = &content.configuration_set {
            payload["ConfigurationSetName"] = json!(configuration_set);
        }

        payload
    }
}

#[async_trait]
impl ChannelSender for SmsChannel {
    type Content = SmsContent;

    async fn send(
        &self,
        sender: &str,
        recipient: &str,
        content: &SmsContent,
        role: MessageRole,
    ) -> DispatchResult {
        let payload = self.build_payload(sender, recipient, content, role);
        post_for_message_id(
            &self.client,
            &self.endpoint,
            Channel::Sms,
            &payload,
            &["MessageId", "messageId"],
        )
        .await
    }
}
