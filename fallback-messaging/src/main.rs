use std::sync::Arc;

use fallback_messaging::api::{ApiServer, AppState};
use fallback_messaging::channels::{ChannelDispatch, ChannelRouter};
use fallback_messaging::config::AppConfig;
use fallback_messaging::database::{
    self,
    repositories::{SqlxDeliveryRecordRepository, SqlxFallbackQueue},
};
use fallback_messaging::delivery::{FallbackEvaluator, FallbackWorker};
use fallback_messaging::logging;
use fallback_messaging::utils::http_client::{build_provider_client, install_rustls_provider};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env_or_default();
    let logging_config = logging::init_logging(config.log_format)?;
    config.log_ignored();

    install_rustls_provider();

    // Initialize database
    let pool = database::init_pool(&config.database_url).await?;
    database::run_migrations(&pool).await?;

    let client = build_provider_client(config.providers.timeout_secs);
    let dispatch: Arc<dyn ChannelDispatch> = Arc::new(ChannelRouter::from_endpoints(
        config.providers.email.clone(),
        config.providers.sms.clone(),
        config.providers.whatsapp.clone(),
        &config.providers.meta_api_version,
        client,
    ));

    // Fallback worker
    let records = Arc::new(SqlxDeliveryRecordRepository::new(pool.clone()));
    let queue = Arc::new(SqlxFallbackQueue::new(pool.clone()));
    let evaluator = Arc::new(FallbackEvaluator::new(dispatch.clone(), records));
    let worker = Arc::new(FallbackWorker::new(queue, evaluator, config.worker.clone()));
    let worker_handle = worker.start();

    // API server
    let state = AppState::from_pool(pool.clone(), dispatch).with_logging_config(logging_config);
    let server = ApiServer::new(config.api.clone(), state);

    let cancel_token = server.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            cancel_token.cancel();
        }
    });

    tracing::info!("fallback-messaging initialized successfully");
    let result = server.run().await;

    worker.stop();
    if let Err(e) = worker_handle.await {
        tracing::warn!("Fallback worker task ended abnormally: {}", e);
    }
    pool.close().await;

    result?;
    Ok(())
}
