//! Shared job collection.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use autoflow_core::{Entity, Job, JobId, JobPayload, UserId, DEFAULT_MAX_ATTEMPTS};

use crate::error::QueueError;

/// Keyed collection of live (non-terminal) jobs.
///
/// Cheap to clone; clones share the same collection. Keys are UUIDv7 job ids,
/// so a scan visits jobs in enqueue order. Jobs re-queued after a failed
/// attempt keep their key, so they are visited before anything enqueued
/// after them.
#[derive(Debug, Clone)]
pub struct JobQueue {
    jobs: Arc<Mutex<BTreeMap<JobId, Job>>>,
    max_attempts: u32,
}

impl JobQueue {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(BTreeMap::new())),
            max_attempts: max_attempts.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<JobId, Job>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Validate `payload` and insert it as a new pending job.
    pub fn enqueue(&self, owner_id: UserId, payload: JobPayload) -> Result<JobId, QueueError> {
        payload.validate()?;
        Ok(self.insert(owner_id, payload))
    }

    /// Insert without validation. For payloads the engine builds itself,
    /// such as flow replies, which are sent even when their text is blank.
    pub fn insert(&self, owner_id: UserId, payload: JobPayload) -> JobId {
        let job = Job::new(owner_id, payload, self.max_attempts);
        let id = *job.id();
        debug!(job_id = %id, job_type = %job.job_type(), owner_id = %owner_id, "job enqueued");
        self.lock().insert(id, job);
        id
    }

    /// Decode and insert an untyped submission (`content-generation`, ...).
    pub fn enqueue_raw(
        &self,
        type_name: &str,
        owner_id: UserId,
        body: serde_json::Value,
    ) -> Result<JobId, QueueError> {
        let payload = JobPayload::decode(type_name, body)?;
        self.enqueue(owner_id, payload)
    }

    /// Claim the first eligible job found in a scan: it is marked
    /// `processing` and its attempt counter is incremented.
    pub fn dequeue_next_eligible(&self) -> Option<Job> {
        let mut jobs = self.lock();
        let job = jobs.values_mut().find(|j| j.is_eligible())?;
        // Eligibility was checked under the same lock.
        job.mark_processing().ok()?;
        Some(job.clone())
    }

    pub fn has_eligible(&self) -> bool {
        self.lock().values().any(Job::is_eligible)
    }

    /// Write back a job that stays queued (e.g. re-queued for retry).
    pub fn update(&self, job: &Job) {
        let mut jobs = self.lock();
        if let Some(slot) = jobs.get_mut(job.id()) {
            *slot = job.clone();
        }
    }

    pub fn remove(&self, id: JobId) -> Option<Job> {
        self.lock().remove(&id)
    }

    pub fn get(&self, id: JobId) -> Option<Job> {
        self.lock().get(&id).cloned()
    }

    /// Live jobs in scan order.
    pub fn snapshot(&self) -> Vec<Job> {
        self.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use autoflow_core::{ChannelId, JobStatus, JobType, MessageDeliveryPayload};

    use super::*;

    fn reply(content: &str) -> JobPayload {
        JobPayload::MessageDelivery(MessageDeliveryPayload {
            channel_id: ChannelId::new("wa-1"),
            recipient: "+15550100".to_string(),
            content: content.to_string(),
            flow_id: None,
        })
    }

    #[test]
    fn enqueue_and_claim() {
        let queue = JobQueue::default();
        let owner = UserId::new();

        let job_id = queue.enqueue(owner, reply("hi")).unwrap();

        let claimed = queue.dequeue_next_eligible().unwrap();
        assert_eq!(claimed.id, job_id);
        assert_eq!(claimed.status, JobStatus::Processing);
        assert_eq!(claimed.attempts, 1);
        assert_eq!(claimed.max_attempts, 3);

        // Processing jobs are not eligible.
        assert!(queue.dequeue_next_eligible().is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn scan_visits_jobs_in_enqueue_order() {
        let queue = JobQueue::default();
        let owner = UserId::new();
        let first = queue.enqueue(owner, reply("one")).unwrap();
        let second = queue.enqueue(owner, reply("two")).unwrap();

        assert_eq!(queue.dequeue_next_eligible().unwrap().id, first);
        assert_eq!(queue.dequeue_next_eligible().unwrap().id, second);
    }

    #[test]
    fn requeued_job_is_claimed_again_until_exhausted() {
        let queue = JobQueue::new(2);
        let id = queue.enqueue(UserId::new(), reply("hi")).unwrap();

        let mut job = queue.dequeue_next_eligible().unwrap();
        job.mark_retrying("boom");
        queue.update(&job);

        let mut job = queue.dequeue_next_eligible().unwrap();
        assert_eq!(job.id, id);
        assert_eq!(job.attempts, 2);

        job.mark_retrying("boom");
        queue.update(&job);
        assert!(!queue.has_eligible());
        assert!(queue.dequeue_next_eligible().is_none());
    }

    #[test]
    fn enqueue_raw_rejects_unknown_types_and_bad_payloads() {
        let queue = JobQueue::default();
        let owner = UserId::new();

        assert!(queue.enqueue_raw("hologram", owner, serde_json::json!({})).is_err());
        assert!(queue
            .enqueue_raw("message-delivery", owner, serde_json::json!({"recipient": "x"}))
            .is_err());
        assert!(queue.is_empty());

        let id = queue
            .enqueue_raw(
                "message-delivery",
                owner,
                serde_json::json!({"channel_id": "wa-1", "recipient": "x", "content": "hello"}),
            )
            .unwrap();
        assert_eq!(queue.get(id).unwrap().job_type(), JobType::MessageDelivery);
    }

    #[test]
    fn insert_accepts_blank_reply_text() {
        let queue = JobQueue::default();
        assert!(queue.enqueue(UserId::new(), reply("")).is_err());

        let id = queue.insert(UserId::new(), reply(""));
        assert_eq!(queue.get(id).unwrap().job_type(), JobType::MessageDelivery);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn remove_drops_job_from_snapshot() {
        let queue = JobQueue::default();
        let id = queue.enqueue(UserId::new(), reply("hi")).unwrap();
        assert_eq!(queue.snapshot().len(), 1);
        assert!(queue.remove(id).is_some());
        assert!(queue.snapshot().is_empty());
    }
}
