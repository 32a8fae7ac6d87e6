//! Fallback evaluation.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::FallbackTask;
use crate::Result;
use crate::channels::{ChannelDispatch, MessageRole};
use crate::database::repositories::DeliveryRecordRepository;
use crate::database::time::now_ms;

/// Successful outcomes of an evaluation. Missing records, dispatch failures
/// and store failures come back as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationOutcome {
    /// Primary delivery was confirmed in time.
    Suppressed,
    /// The fallback message went out and the record now says so.
    FallbackSent { fallback_message_id: String },
}

/// Decides, once the grace period is over, whether the fallback goes out.
pub struct FallbackEvaluator {
    dispatch: Arc<dyn ChannelDispatch>,
    records: Arc<dyn DeliveryRecordRepository>,
}

impl FallbackEvaluator {
    pub fn new(
        dispatch: Arc<dyn ChannelDispatch>,
        records: Arc<dyn DeliveryRecordRepository>,
    ) -> Self {
        Self { dispatch, records }
    }

    /// Evaluate one task.
    ///
    /// Anything but `delivered` counts as unconfirmed. The record moves to
    /// `sent_fallback` after the attempt even when the provider refused it;
    /// the dispatch error is still returned. The status write is
    /// unconditional, so running the same task twice sends the fallback twice
    /// but leaves the record in the same state.
    pub async fn evaluate(&self, task: &FallbackTask) -> Result<EvaluationOutcome> {
        let record = self.records.get_record(&task.message_id).await?;

        if record.is_delivered() {
            debug!(message_id = %task.message_id, "Primary delivered; fallback suppressed");
            return Ok(EvaluationOutcome::Suppressed);
        }

        let spec = task.fallback_spec();
        let sent = self.dispatch.send(&spec, MessageRole::Fallback).await;

        // The fallback attempt is final either way.
        self.records
            .mark_sent_fallback(&task.message_id, now_ms())
            .await?;

        let fallback_message_id = sent.map_err(|e| {
            warn!(
                message_id = %task.message_id,
                channel = %spec.channel(),
                "Fallback dispatch failed: {}",
                e
            );
            e
        })?;

        info!(
            message_id = %task.message_id,
            %fallback_message_id,
            channel = %spec.channel(),
            previous_status = %record.status,
            "Fallback message sent"
        );

        Ok(EvaluationOutcome::FallbackSent {
            fallback_message_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::channels::Channel;
    use crate::database::models::{DeliveryRecordDbModel, DeliveryStatus};
    use crate::database::repositories::SqlxDeliveryRecordRepository;
    use crate::database::test_pool;
    use crate::delivery::test_support::{
        RecordingDispatch, UnavailableRecords, email_spec, sms_spec,
    };

    async fn seeded_records(message_id: &str) -> Arc<SqlxDeliveryRecordRepository> {
        let records = Arc::new(SqlxDeliveryRecordRepository::new(test_pool().await));
        let record =
            DeliveryRecordDbModel::new_sent(message_id, "fallback", &email_spec(), &sms_spec())
                .unwrap();
        records.create_record(&record).await.unwrap();
        records
    }

    #[tokio::test]
    async fn test_unconfirmed_sends_fallback_once() {
        let records = seeded_records("email-1").await;
        let dispatch = Arc::new(RecordingDispatch::default());
        let evaluator = FallbackEvaluator::new(dispatch.clone(), records.clone());

        let outcome = evaluator
            .evaluate(&FallbackTask::new("email-1", sms_spec()))
            .await
            .unwrap();

        assert!(matches!(outcome, EvaluationOutcome::FallbackSent { .. }));
        let sent = dispatch.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.channel(), Channel::Sms);
        assert_eq!(sent[0].1, MessageRole::Fallback);

        let record = records.get_record("email-1").await.unwrap();
        assert_eq!(record.delivery_status(), Some(DeliveryStatus::SentFallback));
        assert!(record.fallback_sent_at.is_some());
    }

    #[tokio::test]
    async fn test_delivered_suppresses_fallback() {
        let records = seeded_records("email-1").await;
        records.mark_delivered("email-1").await.unwrap();
        let dispatch = Arc::new(RecordingDispatch::default());
        let evaluator = FallbackEvaluator::new(dispatch.clone(), records.clone());

        let outcome = evaluator
            .evaluate(&FallbackTask::new("email-1", sms_spec()))
            .await
            .unwrap();

        assert_eq!(outcome, EvaluationOutcome::Suppressed);
        assert!(dispatch.sent().is_empty());
        assert!(records.get_record("email-1").await.unwrap().is_delivered());
    }

    #[tokio::test]
    async fn test_redelivery_resends_but_state_is_stable() {
        let records = seeded_records("email-1").await;
        let dispatch = Arc::new(RecordingDispatch::default());
        let evaluator = FallbackEvaluator::new(dispatch.clone(), records.clone());
        let task = FallbackTask::new("email-1", sms_spec());

        evaluator.evaluate(&task).await.unwrap();
        evaluator.evaluate(&task).await.unwrap();

        assert_eq!(dispatch.sent().len(), 2);
        let record = records.get_record("email-1").await.unwrap();
        assert_eq!(record.delivery_status(), Some(DeliveryStatus::SentFallback));
    }

    #[tokio::test]
    async fn test_missing_record_is_not_found() {
        let records = Arc::new(SqlxDeliveryRecordRepository::new(test_pool().await));
        let dispatch = Arc::new(RecordingDispatch::default());
        let evaluator = FallbackEvaluator::new(dispatch.clone(), records);

        let err = evaluator
            .evaluate(&FallbackTask::new("ghost", sms_spec()))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(dispatch.sent().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_failure_still_closes_record() {
        let records = seeded_records("email-1").await;
        let dispatch = Arc::new(RecordingDispatch::failing(&[Channel::Sms]));
        let evaluator = FallbackEvaluator::new(dispatch.clone(), records.clone());

        let err = evaluator
            .evaluate(&FallbackTask::new("email-1", sms_spec()))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Dispatch(_)));
        assert_eq!(dispatch.sent().len(), 1);
        let record = records.get_record("email-1").await.unwrap();
        assert_eq!(record.delivery_status(), Some(DeliveryStatus::SentFallback));
        assert!(record.fallback_sent_at.is_some());
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let dispatch = Arc::new(RecordingDispatch::default());
        let evaluator = FallbackEvaluator::new(dispatch.clone(), Arc::new(UnavailableRecords));

        let err = evaluator
            .evaluate(&FallbackTask::new("email-1", sms_spec()))
            .await
            .unwrap_err();

        assert!(err.is_store_failure());
        assert!(dispatch.sent().is_empty());
    }
}
