//! The single consumer that drains the job queue.
//!
//! ## Model
//!
//! - One worker task at most; it exits when no eligible job is left.
//! - `enqueue` wakes the worker; the idle → running transition is guarded by
//!   an atomic flag so concurrent enqueues start exactly one worker.
//! - A failed attempt that will be retried suspends the worker for the
//!   backoff delay, which also holds back every other queued job.
//! - Exhausted jobs are logged to the activity log and removed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::json;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use autoflow_core::{Job, JobId, JobPayload, UserId};

use super::executor::JobHandler;
use super::queue::JobQueue;
use super::retry::RetryController;
use super::JobSink;
use crate::collaborators::{ActivityEvent, ActivityKind, Persistence};
use crate::error::{HandlerError, QueueError};

struct Shared {
    queue: JobQueue,
    handler: Arc<dyn JobHandler>,
    retry: RetryController,
    persistence: Arc<dyn Persistence>,
    running: AtomicBool,
    idle: Notify,
}

/// Handle to the processing loop. Cheap to clone.
#[derive(Clone)]
pub struct ProcessingLoop {
    shared: Arc<Shared>,
}

impl core::fmt::Debug for ProcessingLoop {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProcessingLoop")
            .field("queued", &self.shared.queue.len())
            .field("running", &self.is_running())
            .finish()
    }
}

impl ProcessingLoop {
    pub fn new(
        queue: JobQueue,
        handler: Arc<dyn JobHandler>,
        retry: RetryController,
        persistence: Arc<dyn Persistence>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue,
                handler,
                retry,
                persistence,
                running: AtomicBool::new(false),
                idle: Notify::new(),
            }),
        }
    }

    pub fn queue(&self) -> &JobQueue {
        &self.shared.queue
    }

    pub fn retry(&self) -> &RetryController {
        &self.shared.retry
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Insert a job and make sure the worker is running.
    pub fn enqueue(&self, owner_id: UserId, payload: JobPayload) -> Result<JobId, QueueError> {
        let id = self.shared.queue.enqueue(owner_id, payload)?;
        self.wake();
        Ok(id)
    }

    /// Decode, insert, and wake. See [`JobQueue::enqueue_raw`].
    pub fn enqueue_raw(
        &self,
        type_name: &str,
        owner_id: UserId,
        body: serde_json::Value,
    ) -> Result<JobId, QueueError> {
        let id = self.shared.queue.enqueue_raw(type_name, owner_id, body)?;
        self.wake();
        Ok(id)
    }

    /// Start the worker if it is idle. No-op when it is already running.
    pub fn wake(&self) {
        if !self.try_start() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let this = self.clone();
                runtime.spawn(async move { this.drain().await });
            }
            Err(_) => {
                warn!("no async runtime available; job processing deferred until the next wake");
                self.shared.running.store(false, Ordering::SeqCst);
            }
        }
    }

    fn try_start(&self) -> bool {
        self.shared
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Resolve once the worker is idle and nothing eligible is queued.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if !self.is_running() && !self.shared.queue.has_eligible() {
                return;
            }
            notified.await;
        }
    }

    async fn drain(self) {
        debug!("processing loop started");
        loop {
            while let Some(job) = self.shared.queue.dequeue_next_eligible() {
                self.process(job).await;
            }

            self.shared.running.store(false, Ordering::SeqCst);
            // An enqueue may have slipped in between the last scan and the
            // store above; it saw `running == true` and did not spawn.
            if !self.shared.queue.has_eligible() || !self.try_start() {
                break;
            }
        }
        debug!("processing loop idle");
        self.shared.idle.notify_waiters();
    }

    async fn process(&self, mut job: Job) {
        let started = tokio::time::Instant::now();
        debug!(
            job_id = %job.id,
            job_type = %job.job_type(),
            attempt = job.attempts,
            max_attempts = job.max_attempts,
            "job attempt started"
        );

        let result = self.run_attempt(&job).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                job.mark_completed();
                self.shared.queue.remove(job.id);
                info!(
                    job_id = %job.id,
                    job_type = %job.job_type(),
                    attempts = job.attempts,
                    elapsed_ms,
                    "job completed"
                );
            }
            Err(err) if self.shared.retry.should_retry(&job) => {
                job.mark_retrying(err.to_string());
                self.shared.queue.update(&job);

                let delay = self.shared.retry.backoff_delay(job.attempts);
                warn!(
                    job_id = %job.id,
                    job_type = %job.job_type(),
                    attempt = job.attempts,
                    transient = err.is_transient(),
                    error = %err,
                    backoff_ms = delay.as_millis() as u64,
                    "job attempt failed; retrying after backoff"
                );
                self.shared.retry.wait(job.attempts).await;
            }
            Err(err) => {
                job.mark_failed(err.to_string());
                self.shared.queue.remove(job.id);
                error!(
                    job_id = %job.id,
                    job_type = %job.job_type(),
                    attempts = job.attempts,
                    error = %err,
                    "job failed permanently"
                );
                self.record_failure(&job).await;
            }
        }
    }

    /// Run the handler on its own task so a panicking handler only fails the attempt.
    async fn run_attempt(&self, job: &Job) -> Result<(), HandlerError> {
        let handler = self.shared.handler.clone();
        let attempt = job.clone();
        match tokio::spawn(async move { handler.handle(&attempt).await }).await {
            Ok(result) => result,
            Err(join_err) => Err(HandlerError::terminal(format!("handler aborted: {join_err}"))),
        }
    }

    async fn record_failure(&self, job: &Job) {
        let event = ActivityEvent::new(
            job.owner_id,
            ActivityKind::JobFailed,
            format!("{} job failed after {} attempts", job.job_type(), job.attempts),
        )
        .with_details(json!({
            "job_id": job.id,
            "job_type": job.job_type(),
            "attempts": job.attempts,
            "error": job.last_error,
        }));

        if let Err(e) = self.shared.persistence.log_activity(event).await {
            error!(job_id = %job.id, error = %e, "failed to record job failure in activity log");
        }
    }
}

impl JobSink for ProcessingLoop {
    fn submit(&self, owner_id: UserId, payload: JobPayload) -> Result<JobId, QueueError> {
        let id = self.shared.queue.insert(owner_id, payload);
        self.wake();
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use autoflow_core::{ChannelId, ContentGenerationPayload, EntityId, JobType, MessageDeliveryPayload};
    use tokio::time::Instant;

    use super::*;
    use crate::collaborators::in_memory::{InMemoryCollaborators, InMemoryPersistence, ScriptedGenerator};
    use crate::config::EngineConfig;
    use crate::error::CollaboratorError;
    use crate::jobs::JobExecutor;

    /// Handler that fails the first `failures` attempts of every job, recording
    /// when each attempt started.
    struct FlakyHandler {
        failures: u32,
        started: Mutex<Vec<(JobId, u32, Instant)>>,
    }

    impl FlakyHandler {
        fn new(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failures,
                started: Mutex::new(Vec::new()),
            })
        }

        fn attempts(&self) -> Vec<(JobId, u32, Instant)> {
            self.started.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl JobHandler for FlakyHandler {
        async fn handle(&self, job: &Job) -> Result<(), HandlerError> {
            self.started
                .lock()
                .unwrap()
                .push((job.id, job.attempts, Instant::now()));
            if job.attempts <= self.failures {
                Err(HandlerError::transient(format!("attempt {} failed", job.attempts)))
            } else {
                Ok(())
            }
        }
    }

    struct PanickingHandler;

    #[async_trait]
    impl JobHandler for PanickingHandler {
        async fn handle(&self, _job: &Job) -> Result<(), HandlerError> {
            panic!("handler bug");
        }
    }

    fn reply(content: &str) -> JobPayload {
        JobPayload::MessageDelivery(MessageDeliveryPayload {
            channel_id: ChannelId::new("wa-1"),
            recipient: "+15550100".to_string(),
            content: content.to_string(),
            flow_id: None,
        })
    }

    fn setup(handler: Arc<dyn JobHandler>) -> (ProcessingLoop, Arc<InMemoryPersistence>) {
        let persistence = InMemoryPersistence::arc();
        let processing = ProcessingLoop::new(
            JobQueue::new(3),
            handler,
            RetryController::default(),
            persistence.clone(),
        );
        (processing, persistence)
    }

    #[tokio::test(start_paused = true)]
    async fn succeeding_job_completes_on_first_attempt() {
        let handler = FlakyHandler::new(0);
        let (processing, persistence) = setup(handler.clone());
        let start = Instant::now();

        let id = processing.enqueue(UserId::new(), reply("hi")).unwrap();
        processing.wait_idle().await;

        assert_eq!(handler.attempts().len(), 1);
        assert_eq!(handler.attempts()[0].1, 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(processing.queue().get(id).is_none());
        assert!(persistence.activity().is_empty());
        assert!(!processing.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_before_attempt_n_plus_one_is_two_to_the_n_seconds() {
        let handler = FlakyHandler::new(2);
        let (processing, persistence) = setup(handler.clone());

        processing.enqueue(UserId::new(), reply("hi")).unwrap();
        processing.wait_idle().await;

        let attempts = handler.attempts();
        assert_eq!(attempts.len(), 3);
        assert_eq!(attempts[1].2 - attempts[0].2, Duration::from_secs(2));
        assert_eq!(attempts[2].2 - attempts[1].2, Duration::from_secs(4));
        assert!(persistence.activity().is_empty());
        assert!(processing.queue().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_job_fails_after_max_attempts() {
        let handler = FlakyHandler::new(u32::MAX);
        let (processing, persistence) = setup(handler.clone());
        let start = Instant::now();

        let id = processing.enqueue(UserId::new(), reply("hi")).unwrap();
        processing.wait_idle().await;

        let attempts: Vec<u32> = handler.attempts().iter().map(|a| a.1).collect();
        assert_eq!(attempts, vec![1, 2, 3]);
        // 2s + 4s, no backoff after the final attempt.
        assert_eq!(start.elapsed(), processing.retry().worst_case_delay(3));
        assert!(processing.queue().get(id).is_none());

        let activity = persistence.activity();
        assert_eq!(activity.len(), 1);
        assert_eq!(activity[0].kind, ActivityKind::JobFailed);
        assert_eq!(activity[0].job_id(), Some(id));
        assert_eq!(activity[0].details["error"], "transient: attempt 3 failed");
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_of_one_job_holds_back_the_others() {
        let handler = FlakyHandler::new(1);
        let (processing, _) = setup(handler.clone());
        let owner = UserId::new();
        let start = Instant::now();

        let first = processing.enqueue(owner, reply("one")).unwrap();
        let second = processing.enqueue(owner, reply("two")).unwrap();
        processing.wait_idle().await;

        let attempts = handler.attempts();
        // first#1 fails → 2s backoff → first#2 (rescanned first) → second#1 fails → 2s → second#2
        let order: Vec<(JobId, u32)> = attempts.iter().map(|a| (a.0, a.1)).collect();
        assert_eq!(order, vec![(first, 1), (first, 2), (second, 1), (second, 2)]);
        assert_eq!(attempts[2].2 - start, Duration::from_secs(2));
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_enqueues_start_a_single_worker() {
        let handler = FlakyHandler::new(0);
        let (processing, _) = setup(handler.clone());

        let mut tasks = Vec::new();
        for i in 0..16 {
            let p = processing.clone();
            tasks.push(tokio::spawn(async move {
                p.enqueue(UserId::new(), reply(&format!("msg {i}"))).unwrap()
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }
        processing.wait_idle().await;

        let attempts = handler.attempts();
        assert_eq!(attempts.len(), 16);
        assert!(attempts.iter().all(|a| a.1 == 1));
        assert!(processing.queue().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn loop_resumes_after_going_idle() {
        let handler = FlakyHandler::new(0);
        let (processing, _) = setup(handler.clone());

        processing.enqueue(UserId::new(), reply("one")).unwrap();
        processing.wait_idle().await;
        assert!(!processing.is_running());

        processing.enqueue(UserId::new(), reply("two")).unwrap();
        processing.wait_idle().await;
        assert_eq!(handler.attempts().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_handler_counts_as_failed_attempt() {
        let (processing, persistence) = setup(Arc::new(PanickingHandler));

        processing.enqueue(UserId::new(), reply("hi")).unwrap();
        processing.wait_idle().await;

        assert!(processing.queue().is_empty());
        let activity = persistence.activity();
        assert_eq!(activity.len(), 1);
        assert!(activity[0].details["error"].as_str().unwrap().contains("handler aborted"));
    }

    #[tokio::test(start_paused = true)]
    async fn content_generation_that_always_throws_is_failed_with_one_activity_entry() {
        let collaborators = InMemoryCollaborators::new().with_generator(ScriptedGenerator::failing(
            CollaboratorError::unavailable("generator", "upstream 500"),
        ));
        let owner = collaborators.persistence.add_user("ada@example.com");
        let executor = JobExecutor::new(collaborators.bundle(), &EngineConfig::default());
        let processing = ProcessingLoop::new(
            JobQueue::new(3),
            Arc::new(executor),
            RetryController::default(),
            collaborators.persistence.clone(),
        );
        let start = Instant::now();

        let id = processing
            .enqueue(
                owner,
                JobPayload::ContentGeneration(ContentGenerationPayload {
                    content_id: EntityId::new(),
                    prompt: "weekly newsletter".to_string(),
                    options: Default::default(),
                }),
            )
            .unwrap();
        processing.wait_idle().await;

        assert_eq!(collaborators.generator.calls(), 3);
        assert!(start.elapsed() >= Duration::from_secs(6));
        assert!(processing.queue().get(id).is_none());

        let activity = collaborators.persistence.activity();
        assert_eq!(activity.len(), 1);
        assert_eq!(activity[0].owner_id, owner);
        assert_eq!(activity[0].details["job_type"], JobType::ContentGeneration.as_str());
        assert_eq!(activity[0].details["attempts"], 3);
    }

    #[test]
    fn wake_outside_runtime_defers_processing() {
        let (processing, _) = setup(FlakyHandler::new(0));
        processing.enqueue(UserId::new(), reply("hi")).unwrap();
        assert!(!processing.is_running());
        assert_eq!(processing.queue().len(), 1);
    }
}
