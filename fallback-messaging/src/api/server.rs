//! API server setup and configuration.

use axum::Router;
use axum::extract::{DefaultBodyLimit, Request};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::api::routes;
use crate::channels::ChannelDispatch;
use crate::confirmation::{
    ConfirmationNormalizer, EmailConfirmation, SmsConfirmation, WhatsAppConfirmation,
};
use crate::database::DbPool;
use crate::database::repositories::{
    DeliveryRecordRepository, FallbackQueueRepository, SqlxDeliveryRecordRepository,
    SqlxFallbackQueue, SqlxWhatsAppMappingRepository,
};
use crate::delivery::PrimaryDispatcher;
use crate::error::Result;
use crate::logging::LoggingConfig;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Server bind address
    pub bind_address: String,
    /// Server port
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Request body size limit in bytes
    pub body_limit: usize,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 12580,
            enable_cors: true,
            body_limit: 1024 * 1024, // 1MB
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Server start time for uptime calculation
    pub start_time: Instant,
    /// Pool for health checks
    pub pool: DbPool,
    pub dispatcher: Arc<PrimaryDispatcher>,
    pub records: Arc<dyn DeliveryRecordRepository>,
    pub fallback_queue: Arc<dyn FallbackQueueRepository>,
    pub email_events: Arc<dyn ConfirmationNormalizer>,
    pub sms_events: Arc<dyn ConfirmationNormalizer>,
    pub whatsapp_events: Arc<dyn ConfirmationNormalizer>,
    /// Logging configuration for dynamic log level changes
    pub logging_config: Option<Arc<LoggingConfig>>,
}

impl AppState {
    /// Wire the sqlx-backed stores and normalizers around `dispatch`.
    pub fn from_pool(pool: DbPool, dispatch: Arc<dyn ChannelDispatch>) -> Self {
        let records: Arc<dyn DeliveryRecordRepository> =
            Arc::new(SqlxDeliveryRecordRepository::new(pool.clone()));
        let queue = Arc::new(SqlxFallbackQueue::new(pool.clone()));
        let mappings = Arc::new(SqlxWhatsAppMappingRepository::new(pool.clone()));

        Self {
            start_time: Instant::now(),
            pool,
            dispatcher: Arc::new(PrimaryDispatcher::new(
                dispatch,
                records.clone(),
                queue.clone(),
            )),
            fallback_queue: queue,
            email_events: Arc::new(EmailConfirmation::new(records.clone())),
            sms_events: Arc::new(SmsConfirmation::new(records.clone())),
            whatsapp_events: Arc::new(WhatsAppConfirmation::new(records.clone(), mappings)),
            records,
            logging_config: None,
        }
    }

    /// Set the logging configuration.
    pub fn with_logging_config(mut self, config: Arc<LoggingConfig>) -> Self {
        self.logging_config = Some(config);
        self
    }
}

/// API server.
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    cancel_token: CancellationToken,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, state: AppState) -> Self {
        Self {
            config,
            state,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Get the cancellation token for graceful shutdown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Build the router with all middleware and routes.
    pub fn build_router(&self) -> Router {
        let mut router = routes::create_router(self.state.clone())
            .layer(DefaultBodyLimit::max(self.config.body_limit));

        if self.config.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            router = router.layer(cors);
        }

        let trace = TraceLayer::new_for_http()
            .make_span_with(|req: &Request| {
                if req.uri().path().starts_with("/health") {
                    Span::none()
                } else {
                    let request_id = req
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default();
                    tracing::info_span!(
                        "request",
                        method = %req.method(),
                        uri = %req.uri(),
                        request_id
                    )
                }
            })
            .on_response(
                |res: &axum::http::Response<_>, latency: Duration, span: &Span| {
                    if span.is_disabled() {
                        return;
                    }
                    let on_response =
                        tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO);
                    use tower_http::trace::OnResponse;
                    on_response.on_response(res, latency, span);
                },
            )
            .on_failure(
                |class: tower_http::classify::ServerErrorsFailureClass,
                 latency: Duration,
                 span: &Span| {
                    if span.is_disabled() {
                        return;
                    }
                    let mut on_failure =
                        tower_http::trace::DefaultOnFailure::new().level(tracing::Level::ERROR);
                    use tower_http::trace::OnFailure;
                    on_failure.on_failure(class, latency, span);
                },
            );

        // Outermost first: the id is assigned before the span reads it.
        router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(trace)
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
    }

    /// Start the server and serve until the cancel token fires.
    pub async fn run(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| crate::error::Error::ApiError(format!("Invalid address: {}", e)))?;

        let router = self.build_router();
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("API server listening on http://{}", addr);

        let cancel_token = self.cancel_token.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                tracing::info!("API server shutting down...");
            })
            .await
            .map_err(|e| crate::error::Error::ApiError(format!("Server error: {}", e)))?;

        Ok(())
    }

    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}
