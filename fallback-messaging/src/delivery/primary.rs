//! Primary dispatch.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};

use super::{FallbackScheduler, FallbackTask, NotificationRequest, UseCase};
use crate::channels::{Channel, ChannelDispatch, DispatchResult, MessageRole};
use crate::database::models::DeliveryRecordDbModel;
use crate::database::repositories::DeliveryRecordRepository;
use crate::{Error, Result};

/// Per-channel result of a broadcast send.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSendResult {
    pub channel: Channel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChannelSendResult {
    fn from_result(channel: Channel, result: DispatchResult) -> Self {
        match result {
            Ok(message_id) => Self {
                channel,
                message_id: Some(message_id),
                error: None,
            },
            Err(e) => Self {
                channel,
                message_id: None,
                error: Some(e.to_string()),
            },
        }
    }

    pub fn is_sent(&self) -> bool {
        self.message_id.is_some()
    }
}

/// What the dispatcher did with a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "use_case", rename_all = "lowercase")]
pub enum DispatchOutcome {
    /// Primary sent, record stored and fallback check scheduled.
    Fallback {
        message_id: String,
        fallback_in_secs: u64,
    },
    /// Both specs sent (or attempted); nothing tracked.
    Broadcast {
        primary: ChannelSendResult,
        fallback: ChannelSendResult,
    },
}

/// Entry point for notification requests.
pub struct PrimaryDispatcher {
    dispatch: Arc<dyn ChannelDispatch>,
    records: Arc<dyn DeliveryRecordRepository>,
    scheduler: Arc<dyn FallbackScheduler>,
}

impl PrimaryDispatcher {
    pub fn new(
        dispatch: Arc<dyn ChannelDispatch>,
        records: Arc<dyn DeliveryRecordRepository>,
        scheduler: Arc<dyn FallbackScheduler>,
    ) -> Self {
        Self {
            dispatch,
            records,
            scheduler,
        }
    }

    pub async fn dispatch(&self, request: &NotificationRequest) -> Result<DispatchOutcome> {
        request.validate()?;
        match request.use_case {
            UseCase::Broadcast => Ok(self.broadcast(request).await),
            UseCase::Fallback => self.send_with_fallback(request).await,
        }
    }

    async fn broadcast(&self, request: &NotificationRequest) -> DispatchOutcome {
        let (primary, fallback) = tokio::join!(
            self.dispatch.send(&request.pc, MessageRole::Primary),
            self.dispatch.send(&request.fc, MessageRole::Fallback),
        );

        let primary = ChannelSendResult::from_result(request.pc.channel(), primary);
        let fallback = ChannelSendResult::from_result(request.fc.channel(), fallback);

        for result in [&primary, &fallback] {
            if let Some(e) = &result.error {
                warn!(channel = %result.channel, "Broadcast send failed: {}", e);
            }
        }
        info!(
            primary_sent = primary.is_sent(),
            fallback_sent = fallback.is_sent(),
            "Broadcast dispatched"
        );

        DispatchOutcome::Broadcast { primary, fallback }
    }

    async fn send_with_fallback(&self, request: &NotificationRequest) -> Result<DispatchOutcome> {
        let fallback_secs = request.fallback_seconds.unwrap_or_default();

        let message_id = self
            .dispatch
            .send(&request.pc, MessageRole::Primary)
            .await
            .map_err(|e| {
                warn!(channel = %request.pc.channel(), "Primary dispatch failed: {}", e);
                Error::from(e)
            })?;

        // From here on the message is out; failures leave it untracked.
        let record = DeliveryRecordDbModel::new_sent(
            &message_id,
            request.use_case.to_string(),
            &request.pc,
            &request.fc,
        )?;
        if let Err(e) = self.records.create_record(&record).await {
            error!(%message_id, "Primary sent but delivery record not stored: {}", e);
            return Err(e);
        }

        let task = FallbackTask::new(&message_id, request.fc.clone());
        if let Err(e) = self
            .scheduler
            .schedule(&task, Duration::from_secs(fallback_secs))
            .await
        {
            error!(%message_id, "Primary sent but fallback check not scheduled: {}", e);
            return Err(e);
        }

        info!(
            %message_id,
            primary = %request.pc.channel(),
            fallback = %request.fc.channel(),
            fallback_secs,
            "Primary message sent"
        );

        Ok(DispatchOutcome::Fallback {
            message_id,
            fallback_in_secs: fallback_secs,
        })
    }
}
