//! Fallback worker.
//!
//! Polls the delay queue and hands visible tasks to the evaluator.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{EvaluationOutcome, FallbackEvaluator, FallbackTask};
use crate::Result;
use crate::database::models::FallbackTaskDbModel;
use crate::database::repositories::FallbackQueueRepository;

/// Configuration for the fallback worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackWorkerConfig {
    /// Poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// How long a received task stays hidden before it is handed out again.
    pub visibility_timeout_secs: u64,
    /// Receives after which a task is dead-lettered instead of evaluated.
    pub max_receive_count: u32,
    /// Tasks claimed per poll.
    pub batch_size: u32,
    /// Tasks evaluated concurrently.
    pub max_concurrency: usize,
}

impl Default for FallbackWorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            visibility_timeout_secs: 30,
            max_receive_count: 5,
            batch_size: 10,
            max_concurrency: 4,
        }
    }
}

/// What happens to a task after evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskDisposition {
    /// Done with it, delete from the queue.
    Ack,
    /// Leave it; it reappears after the visibility timeout.
    Retry,
}

impl TaskDisposition {
    /// Only store failures are retried. Missing records and rejected
    /// fallback sends would fail the same way again.
    pub fn for_result(result: &Result<EvaluationOutcome>) -> Self {
        match result {
            Err(e) if e.is_store_failure() => Self::Retry,
            _ => Self::Ack,
        }
    }
}

pub struct FallbackWorker {
    queue: Arc<dyn FallbackQueueRepository>,
    evaluator: Arc<FallbackEvaluator>,
    config: FallbackWorkerConfig,
    cancellation_token: CancellationToken,
}

impl FallbackWorker {
    pub fn new(
        queue: Arc<dyn FallbackQueueRepository>,
        evaluator: Arc<FallbackEvaluator>,
        config: FallbackWorkerConfig,
    ) -> Self {
        Self {
            queue,
            evaluator,
            config,
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Spawn the poll loop.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let worker = Arc::clone(self);
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        info!(
            "Starting fallback worker (batch {}, concurrency {}, poll {}ms)",
            self.config.batch_size, self.config.max_concurrency, self.config.poll_interval_ms
        );

        tokio::spawn(async move {
            loop {
                if worker.cancellation_token.is_cancelled() {
                    break;
                }

                let processed = match worker.process_batch().await {
                    Ok(n) => n,
                    Err(e) => {
                        error!("Error receiving fallback tasks: {}", e);
                        0
                    }
                };

                // A full batch means more may be waiting.
                if processed as u32 >= worker.config.batch_size {
                    continue;
                }

                tokio::select! {
                    _ = worker.cancellation_token.cancelled() => break,
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            }
            debug!("Fallback worker shut down");
        })
    }

    pub fn stop(&self) {
        self.cancellation_token.cancel();
    }

    /// Claim one batch and process it. Returns the number of tasks claimed.
    pub async fn process_batch(&self) -> Result<usize> {
        let tasks = self
            .queue
            .receive(
                self.config.batch_size,
                Duration::from_secs(self.config.visibility_timeout_secs),
            )
            .await?;
        let count = tasks.len();

        futures::stream::iter(tasks)
            .for_each_concurrent(self.config.max_concurrency.max(1), |task| async move {
                self.handle_task(task).await;
            })
            .await;

        Ok(count)
    }

    async fn handle_task(&self, task: FallbackTaskDbModel) {
        if task.receive_count > i64::from(self.config.max_receive_count) {
            self.dead_letter(&task, "exceeded maximum receive count").await;
            return;
        }

        let payload: FallbackTask = match serde_json::from_str(&task.payload) {
            Ok(payload) => payload,
            Err(e) => {
                self.dead_letter(&task, &format!("unreadable payload: {e}"))
                    .await;
                return;
            }
        };

        let result = self.evaluator.evaluate(&payload).await;
        match &result {
            Ok(EvaluationOutcome::Suppressed) | Ok(EvaluationOutcome::FallbackSent { .. }) => {}
            Err(e) if e.is_not_found() => {
                warn!(message_id = %task.message_id, "No delivery record for fallback task");
            }
            Err(e) => {
                warn!(
                    message_id = %task.message_id,
                    receive_count = task.receive_count,
                    "Fallback evaluation failed: {}",
                    e
                );
            }
        }

        if TaskDisposition::for_result(&result) == TaskDisposition::Ack {
            if let Err(e) = self.queue.ack(task.id).await {
                error!(task_id = task.id, "Failed to acknowledge fallback task: {}", e);
            }
        }
    }

    async fn dead_letter(&self, task: &FallbackTaskDbModel, reason: &str) {
        if let Err(e) = self.queue.dead_letter(task, reason).await {
            error!(task_id = task.id, "Failed to dead-letter fallback task: {}", e);
        }
    }
}
