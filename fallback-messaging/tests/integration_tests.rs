//! Integration tests for fallback-messaging.
//!
//! These tests use a real file-backed SQLite database with the migrations
//! applied and a recording fake in place of the provider APIs.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use fallback_messaging::channels::{
    Channel, ChannelDispatch, ChannelSpec, DispatchFailure, DispatchResult, MessageRole,
};
use fallback_messaging::database::{DbPool, init_pool, run_migrations};

/// Helper to create a test database with migrations applied.
///
/// Keep the returned directory alive for the duration of the test.
async fn setup_test_db() -> (TempDir, DbPool) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("test.db").display());
    let pool = init_pool(&url).await.expect("Failed to create test pool");
    run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    (dir, pool)
}

/// Stands in for the provider APIs. Ids are `<channel>-<n>`.
#[derive(Default)]
struct FakeProviders {
    failing: HashSet<Channel>,
    counter: AtomicUsize,
    sent: Mutex<Vec<(ChannelSpec, MessageRole)>>,
}

impl FakeProviders {
    fn failing(channels: &[Channel]) -> Self {
        Self {
            failing: channels.iter().copied().collect(),
            ..Default::default()
        }
    }

    fn sent(&self) -> Vec<(ChannelSpec, MessageRole)> {
        self.sent.lock().unwrap().clone()
    }

    fn sent_on(&self, channel: Channel) -> usize {
        self.sent()
            .iter()
            .filter(|(spec, _)| spec.channel() == channel)
            .count()
    }
}

#[async_trait]
impl ChannelDispatch for FakeProviders {
    async fn send(&self, spec: &ChannelSpec, role: MessageRole) -> DispatchResult {
        self.sent.lock().unwrap().push((spec.clone(), role));
        let channel = spec.channel();
        if self.failing.contains(&channel) {
            return Err(DispatchFailure::Rejected {
                channel,
                status: 500,
                body: "provider unavailable".into(),
            });
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("{channel}-{n}"))
    }
}

fn email_to_sms_request(fallback_seconds: u64) -> serde_json::Value {
    serde_json::json!({
        "use_case": "fallback",
        "pc": {
            "channel": "email",
            "sender": "noreply@example.com",
            "recipient": "user@example.com",
            "email": {"subject": "Your code", "text": "123456"}
        },
        "fc": {
            "channel": "sms",
            "sender": "+15550001111",
            "recipient": "+15552223333",
            "sms": {"message": "Your code is 123456", "message_type": "TRANSACTIONAL"}
        },
        "fallback_seconds": fallback_seconds
    })
}

mod database_tests {
    use super::*;

    #[tokio::test]
    async fn test_database_migrations() {
        let (_dir, pool) = setup_test_db().await;

        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .fetch_all(&pool)
                .await
                .expect("Failed to query tables");
        let table_names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();

        for table in [
            "delivery_record",
            "whatsapp_message_mapping",
            "fallback_task",
            "fallback_dead_letter",
        ] {
            assert!(table_names.contains(&table), "{table} table missing");
        }
    }

    #[tokio::test]
    async fn test_wal_mode_enabled() {
        let (_dir, pool) = setup_test_db().await;

        let result: (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .expect("Failed to query journal mode");
        assert_eq!(result.0.to_lowercase(), "wal");
    }
}

mod scenario_tests {
    use super::*;
    use fallback_messaging::confirmation::{
        ConfirmationNormalizer, EmailConfirmation, WhatsAppConfirmation,
    };
    use fallback_messaging::database::repositories::{
        DeliveryRecordRepository, FallbackQueueRepository, SqlxDeliveryRecordRepository,
        SqlxFallbackQueue, SqlxWhatsAppMappingRepository,
    };
    use fallback_messaging::delivery::{
        DispatchOutcome, FallbackEvaluator, FallbackWorker, FallbackWorkerConfig,
        NotificationRequest, PrimaryDispatcher,
    };
    use serde_json::json;

    struct Harness {
        _dir: TempDir,
        pool: DbPool,
        providers: Arc<FakeProviders>,
        records: Arc<SqlxDeliveryRecordRepository>,
        queue: Arc<SqlxFallbackQueue>,
        dispatcher: PrimaryDispatcher,
        worker: FallbackWorker,
    }

    async fn harness(providers: FakeProviders) -> Harness {
        let (dir, pool) = setup_test_db().await;
        let providers = Arc::new(providers);
        let records = Arc::new(SqlxDeliveryRecordRepository::new(pool.clone()));
        let queue = Arc::new(SqlxFallbackQueue::new(pool.clone()));

        let dispatcher = PrimaryDispatcher::new(providers.clone(), records.clone(), queue.clone());
        let evaluator = Arc::new(FallbackEvaluator::new(providers.clone(), records.clone()));
        let worker = FallbackWorker::new(
            queue.clone(),
            evaluator,
            FallbackWorkerConfig {
                poll_interval_ms: 10,
                visibility_timeout_secs: 30,
                max_receive_count: 5,
                batch_size: 10,
                max_concurrency: 2,
            },
        );

        Harness {
            _dir: dir,
            pool,
            providers,
            records,
            queue,
            dispatcher,
            worker,
        }
    }

    impl Harness {
        async fn send(&self, request: serde_json::Value) -> String {
            let request: NotificationRequest = serde_json::from_value(request).unwrap();
            match self.dispatcher.dispatch(&request).await.unwrap() {
                DispatchOutcome::Fallback { message_id, .. } => message_id,
                other => panic!("unexpected outcome {other:?}"),
            }
        }

        /// Make every scheduled task due, as if the grace period had passed.
        async fn elapse_grace_period(&self) {
            sqlx::query("UPDATE fallback_task SET visible_at = 0")
                .execute(&self.pool)
                .await
                .unwrap();
        }

        async fn status(&self, message_id: &str) -> String {
            self.records.get_record(message_id).await.unwrap().status
        }
    }

    #[tokio::test]
    async fn test_confirmed_in_time_suppresses_fallback() {
        let h = harness(FakeProviders::default()).await;

        let message_id = h.send(email_to_sms_request(300)).await;
        assert_eq!(h.status(&message_id).await, "sent");
        assert_eq!(h.providers.sent_on(Channel::Email), 1);

        // Not due yet.
        assert_eq!(h.worker.process_batch().await.unwrap(), 0);
        assert_eq!(h.queue.pending_count().await.unwrap(), 1);

        let email_events = EmailConfirmation::new(h.records.clone());
        email_events
            .handle(json!({"eventType": "Delivery", "mail": {"messageId": message_id}}))
            .await
            .unwrap();
        assert_eq!(h.status(&message_id).await, "delivered");

        h.elapse_grace_period().await;
        assert_eq!(h.worker.process_batch().await.unwrap(), 1);

        assert_eq!(h.status(&message_id).await, "delivered");
        assert_eq!(h.providers.sent_on(Channel::Sms), 0);
        assert_eq!(h.queue.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unconfirmed_sends_fallback() {
        let h = harness(FakeProviders::default()).await;

        let message_id = h.send(email_to_sms_request(300)).await;
        h.elapse_grace_period().await;
        assert_eq!(h.worker.process_batch().await.unwrap(), 1);

        let record = h.records.get_record(&message_id).await.unwrap();
        assert_eq!(record.status, "sent_fallback");
        assert!(record.fallback_sent_at.is_some());

        let fallback_sends: Vec<_> = h
            .providers
            .sent()
            .into_iter()
            .filter(|(_, role)| *role == MessageRole::Fallback)
            .collect();
        assert_eq!(fallback_sends.len(), 1);
        assert_eq!(fallback_sends[0].0.channel(), Channel::Sms);
        assert_eq!(fallback_sends[0].0.recipient, "+15552223333");
        assert_eq!(h.queue.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_late_confirmation_wins_after_fallback() {
        let h = harness(FakeProviders::default()).await;

        let message_id = h.send(email_to_sms_request(0)).await;
        h.worker.process_batch().await.unwrap();
        assert_eq!(h.status(&message_id).await, "sent_fallback");

        EmailConfirmation::new(h.records.clone())
            .handle(json!({"eventType": "Delivery", "mail": {"messageId": message_id}}))
            .await
            .unwrap();
        assert_eq!(h.status(&message_id).await, "delivered");
    }

    #[tokio::test]
    async fn test_failed_fallback_send_is_not_retried() {
        let h = harness(FakeProviders::failing(&[Channel::Sms])).await;

        let message_id = h.send(email_to_sms_request(0)).await;
        h.worker.process_batch().await.unwrap();

        let record = h.records.get_record(&message_id).await.unwrap();
        assert_eq!(record.status, "sent_fallback");
        assert!(record.fallback_sent_at.is_some());
        assert_eq!(h.queue.pending_count().await.unwrap(), 0);
        assert!(h.queue.list_dead_letters(10).await.unwrap().is_empty());
        assert_eq!(h.providers.sent_on(Channel::Sms), 1);
    }

    #[tokio::test]
    async fn test_whatsapp_primary_confirmed_through_mapping() {
        let h = harness(FakeProviders::default()).await;
        let mappings = Arc::new(SqlxWhatsAppMappingRepository::new(h.pool.clone()));
        let whatsapp_events = WhatsAppConfirmation::new(h.records.clone(), mappings);

        let message_id = h
            .send(json!({
                "use_case": "fallback",
                "pc": {
                    "channel": "whatsapp",
                    "sender": "phone-number-id-1",
                    "recipient": "+15552223333",
                    "whatsapp": {"message": "Your table is ready"}
                },
                "fc": {
                    "channel": "sms",
                    "sender": "+15550001111",
                    "recipient": "+15552223333",
                    "sms": {"message": "Your table is ready", "message_type": "TRANSACTIONAL"}
                },
                "fallback_seconds": 120
            }))
            .await;

        let status_event = |status: &str| {
            let entry = json!({
                "changes": [{
                    "field": "messages",
                    "value": {"statuses": [{"status": status, "id": "wamid.HBgL"}]}
                }]
            });
            json!({"messageId": message_id, "whatsAppWebhookEntry": entry.to_string()})
        };

        whatsapp_events.handle(status_event("accepted")).await.unwrap();
        assert_eq!(h.status(&message_id).await, "sent");

        let mut delivered = status_event("delivered");
        delivered.as_object_mut().unwrap().remove("messageId");
        whatsapp_events.handle(delivered).await.unwrap();
        assert_eq!(h.status(&message_id).await, "delivered");

        h.elapse_grace_period().await;
        h.worker.process_batch().await.unwrap();
        assert_eq!(h.providers.sent_on(Channel::Sms), 0);
    }

    #[tokio::test]
    async fn test_broadcast_tracks_nothing() {
        let h = harness(FakeProviders::failing(&[Channel::Email])).await;

        let mut request = email_to_sms_request(0);
        request["use_case"] = json!("broadcast");
        let request: NotificationRequest = serde_json::from_value(request).unwrap();
        let outcome = h.dispatcher.dispatch(&request).await.unwrap();

        assert!(matches!(outcome, DispatchOutcome::Broadcast { .. }));
        assert_eq!(h.providers.sent().len(), 2);
        assert_eq!(h.queue.pending_count().await.unwrap(), 0);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM delivery_record")
            .fetch_one(&h.pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}

mod api_tests {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use fallback_messaging::api::{ApiServer, ApiServerConfig, AppState};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn app(providers: FakeProviders) -> (TempDir, Router, Arc<FakeProviders>) {
        let (dir, pool) = setup_test_db().await;
        let providers = Arc::new(providers);
        let state = AppState::from_pool(pool, providers.clone());
        let router = ApiServer::new(ApiServerConfig::default(), state).build_router();
        (dir, router, providers)
    }

    async fn call(router: &Router, method: &str, uri: &str, body: Option<String>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map(Body::from).unwrap_or_else(Body::empty))
            .unwrap();

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_submit_and_confirm_over_http() {
        let (_dir, router, _providers) = app(FakeProviders::default()).await;

        let (status, body) = call(
            &router,
            "POST",
            "/api/messages",
            Some(email_to_sms_request(300).to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["use_case"], "fallback");
        assert_eq!(body["fallback_in_secs"], 300);
        let message_id = body["message_id"].as_str().unwrap().to_string();

        let (status, body) = call(&router, "GET", &format!("/api/messages/{message_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "sent");
        assert_eq!(body["primary_channel"], "email");
        assert!(body["fallback_sent_at"].is_null());

        // SNS-wrapped email delivery event.
        let inner = json!({"eventType": "Delivery", "mail": {"messageId": message_id}});
        let envelope = json!({"Records": [{"Sns": {"Message": inner.to_string()}}]});
        let (status, body) =
            call(&router, "POST", "/api/events/email", Some(envelope.to_string())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "delivered");

        let (_, body) = call(&router, "GET", &format!("/api/messages/{message_id}"), None).await;
        assert_eq!(body["status"], "delivered");
    }

    #[tokio::test]
    async fn test_primary_dispatch_failure_is_bad_gateway() {
        let (_dir, router, _providers) = app(FakeProviders::failing(&[Channel::Email])).await;

        let (status, body) = call(
            &router,
            "POST",
            "/api/messages",
            Some(email_to_sms_request(300).to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "DISPATCH_FAILED");
    }

    #[tokio::test]
    async fn test_invalid_request_is_unprocessable() {
        let (_dir, router, providers) = app(FakeProviders::default()).await;

        let mut request = email_to_sms_request(300);
        request.as_object_mut().unwrap().remove("fallback_seconds");
        let (status, _) = call(&router, "POST", "/api/messages", Some(request.to_string())).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(providers.sent().is_empty());
    }

    #[tokio::test]
    async fn test_event_for_unknown_message_is_not_found() {
        let (_dir, router, _providers) = app(FakeProviders::default()).await;

        let event = json!({"eventType": "TEXT_DELIVERED", "messageId": "ghost"});
        let (status, body) = call(&router, "POST", "/api/events/sms", Some(event.to_string())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_malformed_event_is_acknowledged() {
        let (_dir, router, _providers) = app(FakeProviders::default()).await;

        let (status, body) = call(
            &router,
            "POST",
            "/api/events/whatsapp",
            Some("this is not json".to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "ignored");
    }

    #[tokio::test]
    async fn test_unknown_message_lookup() {
        let (_dir, router, _providers) = app(FakeProviders::default()).await;

        let (status, _) = call(&router, "GET", "/api/messages/ghost", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(&router, "GET", "/api/messages/dead-letters", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_health() {
        let (_dir, router, _providers) = app(FakeProviders::default()).await;

        let (status, body) = call(&router, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["pending_fallbacks"], 0);

        let (status, body) = call(&router, "GET", "/health/live", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "alive");
    }

    #[tokio::test]
    async fn test_logging_filter_unavailable_without_subscriber() {
        let (_dir, router, _providers) = app(FakeProviders::default()).await;

        let (status, _) = call(&router, "GET", "/api/logging/filter", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
