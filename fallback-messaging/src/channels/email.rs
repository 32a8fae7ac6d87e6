//! Email channel.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::{
    Channel, ChannelSender, DispatchResult, EmailBody, EmailContent, MessageRole,
    ProviderEndpoint, post_for_message_id,
};

const CHARSET: &str = "UTF-8";

/// Email channel backed by a send-email HTTP API.
pub struct EmailChannel {
    endpoint: ProviderEndpoint,
    client: Client,
}

impl EmailChannel {
    /// Create a new Email channel.
    pub fn new(endpoint: ProviderEndpoint, client: Client) -> Self {
        Self { endpoint, client }
    }

    /// Build the provider request body.
    fn build_payload(
        &self,
        sender: &str,
        recipient: &str,
        content: &EmailContent,
        role: MessageRole,
    ) -> Value {
        let body = match &content.body {
            EmailBody::Template { template } => json!({
                "Template": {
                    "TemplateName": template,
                    "TemplateData": "{}"
                }
            }),
            EmailBody::Simple {
                subject,
                text,
                html,
            } => {
                let mut simple_body = serde_json::Map::new();
                if let Some(text) = text {
                    simple_body.insert("Text".into(), json!({"Data": text, "Charset": CHARSET}));
                }
                if let Some(html) = html {
                    simple_body.insert("Html".into(), json!({"Data": html, "Charset": CHARSET}));
                }
                json!({
                    "Simple": {
                        "Subject": {"Data": subject.as_deref().unwrap_or_default(), "Charset": CHARSET},
                        "Body": simple_body
                    }
                })
            }
        };

        let mut payload = json!({
            "FromEmailAddress": sender,
            "Destination": {"ToAddresses": [recipient]},
            "Content": body,
            "EmailTags": [{"Name": "message_type", "Value": role.to_string()}]
        });

        if let Some(configuration_set) = &content.configuration_set {
            payload["ConfigurationSetName"] = json!(configuration_set);
        }

        payload
    }
}

#[async_trait]
impl ChannelSender for EmailChannel {
    type Content = EmailContent;

    async fn send(
        &self,
        sender: &str,
        recipient: &str,
        content: &EmailContent,
        role: MessageRole,
    ) -> DispatchResult {
        let payload = self.build_payload(sender, recipient, content, role);
        post_for_message_id(
            &self.client,
            &self.endpoint,
            Channel::Email,
            &payload,
            &["MessageId", "messageId"],
        )
        .await
    }
}
