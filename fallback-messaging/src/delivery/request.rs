//! Inbound notification request.

use serde::{Deserialize, Serialize};

use crate::channels::ChannelSpec;
use crate::{Error, Result};

/// What to do with the two channel specs of a request.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UseCase {
    /// Send the primary; send the fallback later unless delivery is confirmed.
    Fallback,
    /// Send both now, track nothing.
    Broadcast,
}

/// A notification to deliver.
///
/// ```json
/// {"use_case": "fallback",
///  "pc": {"channel": "email", "sender": "...", "recipient": "...", "email": {...}},
///  "fc": {"channel": "sms", "sender": "...", "recipient": "...", "sms": {...}},
///  "fallback_seconds": 300}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub use_case: UseCase,
    /// Primary channel spec.
    pub pc: ChannelSpec,
    /// Fallback channel spec.
    pub fc: ChannelSpec,
    /// Grace period before the fallback check; required for `fallback`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_seconds: Option<u64>,
}

impl NotificationRequest {
    pub fn validate(&self) -> Result<()> {
        self.pc
            .validate()
            .map_err(|e| Error::validation(format!("pc: {e}")))?;
        self.fc
            .validate()
            .map_err(|e| Error::validation(format!("fc: {e}")))?;

        if self.use_case == UseCase::Fallback && self.fallback_seconds.is_none() {
            return Err(Error::validation(
                "fallback_seconds is required for the fallback use case",
            ));
        }
        Ok(())
    }
}
