//! Asynchronous job engine: queue, retry policy, dispatch, and the
//! processing loop that ties them together.

pub mod executor;
pub mod handlers;
pub mod processing;
pub mod queue;
pub mod retry;

pub use executor::{JobExecutor, JobHandler};
pub use processing::ProcessingLoop;
pub use queue::JobQueue;
pub use retry::RetryController;

use autoflow_core::{JobId, JobPayload, UserId};

use crate::error::QueueError;

/// Anything that accepts jobs built inside the engine.
///
/// Flow steps enqueue through this seam so they can be exercised without a
/// running processing loop. Payloads are not validated here: a flow's
/// `message` step always yields exactly one delivery job.
pub trait JobSink: Send + Sync + 'static {
    fn submit(&self, owner_id: UserId, payload: JobPayload) -> Result<JobId, QueueError>;
}

impl JobSink for JobQueue {
    fn submit(&self, owner_id: UserId, payload: JobPayload) -> Result<JobId, QueueError> {
        Ok(self.insert(owner_id, payload))
    }
}
