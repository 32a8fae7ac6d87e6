//! Fakes shared by the delivery tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{FallbackScheduler, FallbackTask};
use crate::channels::{
    Channel, ChannelContent, ChannelDispatch, ChannelSpec, DispatchFailure, DispatchResult,
    EmailBody, EmailContent, MessageRole, SmsContent,
};
use crate::database::models::DeliveryRecordDbModel;
use crate::database::repositories::DeliveryRecordRepository;
use crate::{Error, Result};

pub fn email_spec() -> ChannelSpec {
    ChannelSpec {
        sender: "noreply@example.com".into(),
        recipient: "user@example.com".into(),
        content: ChannelContent::Email(EmailContent {
            body: EmailBody::Template {
                template: "order-shipped".into(),
            },
            configuration_set: None,
        }),
    }
}

pub fn sms_spec() -> ChannelSpec {
    ChannelSpec {
        sender: "+15550001111".into(),
        recipient: "+15552223333".into(),
        content: ChannelContent::Sms(SmsContent {
            message: "Your order shipped".into(),
            message_type: "TRANSACTIONAL".into(),
            configuration_set: None,
        }),
    }
}

/// Records every send; ids are `<channel>-<n>`.
#[derive(Default)]
pub struct RecordingDispatch {
    failing: HashSet<Channel>,
    counter: AtomicUsize,
    sent: Mutex<Vec<(ChannelSpec, MessageRole)>>,
}

impl RecordingDispatch {
    pub fn failing(channels: &[Channel]) -> Self {
        Self {
            failing: channels.iter().copied().collect(),
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<(ChannelSpec, MessageRole)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelDispatch for RecordingDispatch {
    async fn send(&self, spec: &ChannelSpec, role: MessageRole) -> DispatchResult {
        self.sent.lock().unwrap().push((spec.clone(), role));
        let channel = spec.channel();
        if self.failing.contains(&channel) {
            return Err(DispatchFailure::Rejected {
                channel,
                status: 400,
                body: "rejected".into(),
            });
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("{channel}-{n}"))
    }
}

#[derive(Default)]
pub struct RecordingScheduler {
    scheduled: Mutex<Vec<(FallbackTask, Duration)>>,
}

impl RecordingScheduler {
    pub fn scheduled(&self) -> Vec<(FallbackTask, Duration)> {
        self.scheduled.lock().unwrap().clone()
    }
}

#[async_trait]
impl FallbackScheduler for RecordingScheduler {
    async fn schedule(&self, task: &FallbackTask, delay: Duration) -> Result<()> {
        self.scheduled.lock().unwrap().push((task.clone(), delay));
        Ok(())
    }
}

/// Every operation fails as if the database were unavailable.
pub struct UnavailableRecords;

#[async_trait]
impl DeliveryRecordRepository for UnavailableRecords {
    async fn get_record(&self, _message_id: &str) -> Result<DeliveryRecordDbModel> {
        Err(Error::Database("database is locked".into()))
    }

    async fn record_exists(&self, _message_id: &str) -> Result<bool> {
        Err(Error::Database("database is locked".into()))
    }

    async fn create_record(&self, _record: &DeliveryRecordDbModel) -> Result<()> {
        Err(Error::Database("database is locked".into()))
    }

    async fn mark_delivered(&self, _message_id: &str) -> Result<()> {
        Err(Error::Database("database is locked".into()))
    }

    async fn mark_sent_fallback(&self, _message_id: &str, _sent_at: i64) -> Result<()> {
        Err(Error::Database("database is locked".into()))
    }
}
