//! Fallback delivery orchestration.
//!
//! - [`PrimaryDispatcher`] sends the primary message, records it and
//!   schedules the fallback check.
//! - [`FallbackEvaluator`] runs the check once the delay has passed.
//! - [`FallbackWorker`] drains the delay queue into the evaluator.

mod evaluator;
mod primary;
mod request;
mod task;
mod worker;

pub use evaluator::{EvaluationOutcome, FallbackEvaluator};
pub use primary::{ChannelSendResult, DispatchOutcome, PrimaryDispatcher};
pub use request::{NotificationRequest, UseCase};
pub use task::{FallbackScheduler, FallbackTask};
pub use worker::{FallbackWorker, FallbackWorkerConfig, TaskDisposition};

#[cfg(test)]
pub(crate) mod test_support;
