//! Routes a [`ChannelSpec`] to the sender for its channel.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use super::{
    ChannelContent, ChannelDispatch, ChannelSender, ChannelSpec, DispatchResult, EmailChannel,
    EmailContent, MessageRole, ProviderEndpoint, SmsChannel, SmsContent, WhatsAppChannel,
    WhatsAppContent,
};

/// One sender per channel.
#[derive(Clone)]
pub struct ChannelRouter {
    email: Arc<dyn ChannelSender<Content = EmailContent>>,
    sms: Arc<dyn ChannelSender<Content = SmsContent>>,
    whatsapp: Arc<dyn ChannelSender<Content = WhatsAppContent>>,
}

impl ChannelRouter {
    pub fn new(
        email: Arc<dyn ChannelSender<Content = EmailContent>>,
        sms: Arc<dyn ChannelSender<Content = SmsContent>>,
        whatsapp: Arc<dyn ChannelSender<Content = WhatsAppContent>>,
    ) -> Self {
        Self {
            email,
            sms,
            whatsapp,
        }
    }

    /// Build the HTTP-backed senders sharing one client.
    pub fn from_endpoints(
        email: ProviderEndpoint,
        sms: ProviderEndpoint,
        whatsapp: ProviderEndpoint,
        meta_api_version: &str,
        client: Client,
    ) -> Self {
        for (name, endpoint) in [("email", &email), ("sms", &sms), ("whatsapp", &whatsapp)] {
            if !endpoint.is_configured() {
                warn!("No {} provider endpoint configured; sends on it will fail", name);
            }
        }

        Self::new(
            Arc::new(EmailChannel::new(email, client.clone())),
            Arc::new(SmsChannel::new(sms, client.clone())),
            Arc::new(WhatsAppChannel::new(whatsapp, client, meta_api_version)),
        )
    }
}

#[async_trait]
impl ChannelDispatch for ChannelRouter {
    async fn send(&self, spec: &ChannelSpec, role: MessageRole) -> DispatchResult {
        debug!(channel = %spec.channel(), %role, recipient = %spec.recipient, "Dispatching message");
        match &spec.content {
            ChannelContent::Email(content) => {
                self.email
                    .send(&spec.sender, &spec.recipient, content, role)
                    .await
            }
            ChannelContent::Sms(content) => {
                self.sms
                    .send(&spec.sender, &spec.recipient, content, role)
                    .await
            }
            ChannelContent::WhatsApp(content) => {
                self.whatsapp
                    .send(&spec.sender, &spec.recipient, content, role)
                    .await
            }
        }
    }
}
