//! Channel identifiers and per-channel message content.

use serde::{Deserialize, Serialize};

/// Communication channel a message can be sent through.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
    WhatsApp,
}

/// Whether a send is the first attempt or the fallback resend.
///
/// Providers receive this as a message tag so their own event streams can
/// tell the two apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageRole {
    Primary,
    Fallback,
}

/// Email body: a stored provider template or inline content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmailBody {
    Template {
        template: String,
    },
    Simple {
        #[serde(default)]
        subject: Option<String>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        html: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailContent {
    #[serde(flatten)]
    pub body: EmailBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_set: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmsContent {
    pub message: String,
    /// Provider message type, e.g. `TRANSACTIONAL`.
    pub message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_set: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhatsAppContent {
    pub message: String,
}

/// Channel-specific content; the variant determines the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelContent {
    Email(EmailContent),
    Sms(SmsContent),
    WhatsApp(WhatsAppContent),
}

impl ChannelContent {
    pub fn channel(&self) -> Channel {
        match self {
            Self::Email(_) => Channel::Email,
            Self::Sms(_) => Channel::Sms,
            Self::WhatsApp(_) => Channel::WhatsApp,
        }
    }

    pub fn configuration_set(&self) -> Option<&str> {
        match self {
            Self::Email(c) => c.configuration_set.as_deref(),
            Self::Sms(c) => c.configuration_set.as_deref(),
            Self::WhatsApp(_) => None,
        }
    }

    /// Serialize just the content part (without channel, sender, recipient).
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Self::Email(c) => serde_json::to_value(c),
            Self::Sms(c) => serde_json::to_value(c),
            Self::WhatsApp(c) => serde_json::to_value(c),
        }
    }

    /// Reject content the provider would refuse anyway.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Email(EmailContent {
                body: EmailBody::Template { template },
                ..
            }) => {
                if template.trim().is_empty() {
                    return Err("email template name is empty".to_string());
                }
            }
            Self::Email(EmailContent {
                body: EmailBody::Simple {
                    subject,
                    text,
                    html,
                },
                ..
            }) => {
                if subject.as_deref().is_none_or(|s| s.trim().is_empty()) {
                    return Err("email content requires a template or a subject".to_string());
                }
                if text.is_none() && html.is_none() {
                    return Err("email content requires text or html".to_string());
                }
            }
            Self::Sms(c) => {
                if c.message.is_empty() {
                    return Err("sms message is empty".to_string());
                }
                if c.message_type.trim().is_empty() {
                    return Err("sms message_type is empty".to_string());
                }
            }
            Self::WhatsApp(c) => {
                if c.message.is_empty() {
                    return Err("whatsapp message is empty".to_string());
                }
            }
        }
        Ok(())
    }
}

/// Who to send to, from whom, and what, on one channel.
///
/// On the wire the content sits under a key named after the channel:
/// `{"channel": "sms", "sender": "...", "recipient": "...", "sms": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawChannelSpec", into = "RawChannelSpec")]
pub struct ChannelSpec {
    /// Sender address, origination number or WhatsApp phone number id.
    pub sender: String,
    pub recipient: String,
    pub content: ChannelContent,
}

impl ChannelSpec {
    pub fn channel(&self) -> Channel {
        self.content.channel()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sender.trim().is_empty() {
            return Err(format!("{} sender is empty", self.channel()));
        }
        if self.recipient.trim().is_empty() {
            return Err(format!("{} recipient is empty", self.channel()));
        }
        self.content.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawChannelSpec {
    channel: Channel,
    sender: String,
    recipient: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<EmailContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sms: Option<SmsContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    whatsapp: Option<WhatsAppContent>,
}

impl TryFrom<RawChannelSpec> for ChannelSpec {
    type Error = String;

    fn try_from(raw: RawChannelSpec) -> Result<Self, Self::Error> {
        let content = match raw.channel {
            Channel::Email => raw.email.map(ChannelContent::Email),
            Channel::Sms => raw.sms.map(ChannelContent::Sms),
            Channel::WhatsApp => raw.whatsapp.map(ChannelContent::WhatsApp),
        }
        .ok_or_else(|| {
            format!(
                "channel is '{0}' but no '{0}' content was provided",
                raw.channel
            )
        })?;

        Ok(Self {
            sender: raw.sender,
            recipient: raw.recipient,
            content,
        })
    }
}

impl From<ChannelSpec> for RawChannelSpec {
    fn from(spec: ChannelSpec) -> Self {
        let channel = spec.channel();
        let mut raw = RawChannelSpec {
            channel,
            sender: spec.sender,
            recipient: spec.recipient,
            email: None,
            sms: None,
            whatsapp: None,
        };
        match spec.content {
            ChannelContent::Email(c) => raw.email = Some(c),
            ChannelContent::Sms(c) => raw.sms = Some(c),
            ChannelContent::WhatsApp(c) => raw.whatsapp = Some(c),
        }
        raw
    }
}
