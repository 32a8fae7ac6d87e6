//! Message channels.
//!
//! This module provides the outbound side of delivery:
//! - Email (provider send-email API)
//! - SMS (provider send-text-message API)
//! - WhatsApp (provider social-messaging API, Meta message format)
//!
//! Each channel implements [`ChannelSender`] for its own content type.
//! [`ChannelRouter`] ties the three together behind [`ChannelDispatch`], the
//! single capability the orchestrator and fallback evaluator depend on.

mod email;
mod router;
mod sms;
mod types;
mod whatsapp;

pub use email::EmailChannel;
pub use router::ChannelRouter;
pub use sms::SmsChannel;
pub use types::{
    Channel, ChannelContent, ChannelSpec, EmailBody, EmailContent, MessageRole, SmsContent,
    WhatsAppContent,
};
pub use whatsapp::{DEFAULT_META_API_VERSION, WhatsAppChannel};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Provider-assigned message identifier returned by a successful send.
pub type MessageId = String;

/// Outcome of a single provider send.
pub type DispatchResult = std::result::Result<MessageId, DispatchFailure>;

/// A provider refused or failed to accept a message.
#[derive(Error, Debug)]
pub enum DispatchFailure {
    #[error("{channel} provider rejected the message: HTTP {status} - {body}")]
    Rejected {
        channel: Channel,
        status: u16,
        body: String,
    },

    #[error("{channel} provider request failed: {source}")]
    Transport {
        channel: Channel,
        #[source]
        source: reqwest::Error,
    },

    #[error("{channel} provider response carried no message id")]
    MissingMessageId { channel: Channel },

    #[error("{channel} provider endpoint is not configured")]
    NotConfigured { channel: Channel },
}

impl DispatchFailure {
    pub fn channel(&self) -> Channel {
        match self {
            Self::Rejected { channel, .. }
            | Self::Transport { channel, .. }
            | Self::MissingMessageId { channel }
            | Self::NotConfigured { channel } => *channel,
        }
    }
}

/// Sends one kind of content through one provider.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    type Content: Send + Sync;

    /// Send `content` from `sender` to `recipient`.
    async fn send(
        &self,
        sender: &str,
        recipient: &str,
        content: &Self::Content,
        role: MessageRole,
    ) -> DispatchResult;
}

/// Sends a [`ChannelSpec`] through whichever channel it names.
#[async_trait]
pub trait ChannelDispatch: Send + Sync {
    async fn send(&self, spec: &ChannelSpec, role: MessageRole) -> DispatchResult;
}

/// HTTP endpoint of a provider API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    /// Send URL; `None` leaves the channel unconfigured.
    pub url: Option<String>,
    /// Bearer token sent with every request.
    pub auth_token: Option<String>,
}

impl ProviderEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            auth_token: None,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }
}

/// POST `payload` to the provider and pull the message id out of the
/// response body.
///
/// Providers disagree on casing (`MessageId` vs `messageId`), so `id_fields`
/// lists the keys to try in order.
pub(crate) async fn post_for_message_id(
    client: &Client,
    endpoint: &ProviderEndpoint,
    channel: Channel,
    payload: &serde_json::Value,
    id_fields: &[&str],
) -> DispatchResult {
    let url = match endpoint.url.as_deref() {
        Some(url) if !url.trim().is_empty() => url,
        _ => return Err(DispatchFailure::NotConfigured { channel }),
    };

    let mut request = client.post(url).json(payload);
    if let Some(token) = &endpoint.auth_token {
        request = request.bearer_auth(token);
    }

    let response = request
        .send()
        .await
        .map_err(|source| DispatchFailure::Transport { channel, source })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(%channel, status = status.as_u16(), "Provider rejected message: {}", body);
        return Err(DispatchFailure::Rejected {
            channel,
            status: status.as_u16(),
            body,
        });
    }

    let body: serde_json::Value = response
        .json()
        .await
        .map_err(|source| DispatchFailure::Transport { channel, source })?;

    let message_id = id_fields
        .iter()
        .find_map(|field| body.get(*field).and_then(|v| v.as_str()))
        .filter(|id| !id.is_empty())
        .ok_or(DispatchFailure::MissingMessageId { channel })?;

    debug!(%channel, message_id, "Provider accepted message");
    Ok(message_id.to_string())
}
