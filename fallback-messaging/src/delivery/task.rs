//! Deferred fallback task and its scheduler.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::channels::{ChannelContent, ChannelSpec};

/// Everything needed to run the fallback send without the original request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackTask {
    /// Internal id of the primary message.
    pub message_id: String,
    /// Fallback channel, sender, recipient and body.
    pub fallback: ChannelSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_set: Option<String>,
}

impl FallbackTask {
    pub fn new(message_id: impl Into<String>, fallback: ChannelSpec) -> Self {
        let configuration_set = fallback.content.configuration_set().map(str::to_string);
        Self {
            message_id: message_id.into(),
            fallback,
            configuration_set,
        }
    }

    /// The spec to send, with the task-level configuration set applied when
    /// the content carries none.
    pub fn fallback_spec(&self) -> ChannelSpec {
        let mut spec = self.fallback.clone();
        if let Some(set) = &self.configuration_set {
            match &mut spec.content {
                ChannelContent::Email(c) if c.configuration_set.is_none() => {
                    c.configuration_set = Some(set.clone());
                }
                ChannelContent::Sms(c) if c.configuration_set.is_none() => {
                    c.configuration_set = Some(set.clone());
                }
                _ => {}
            }
        }
        spec
    }
}

/// Delay-capable queue feeding the fallback evaluator.
///
/// A scheduled task must not be handed to the evaluator before `delay`
/// elapses. There is no upper bound and it may be handed over more than once.
#[async_trait]
pub trait FallbackScheduler: Send + Sync {
    async fn schedule(&self, task: &FallbackTask, delay: Duration) -> Result<()>;
}
