use serde::{Deserialize, Serialize};

use autoflow_core::{Job, JobId, JobStatus, JobType, UserId};

// -------------------------
// Request DTOs
// -------------------------

/// `POST /jobs`. `type` is a job type name such as `content-generation`.
#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    #[serde(rename = "type")]
    pub job_type: String,
    pub owner_id: UserId,
    #[serde(default)]
    pub payload: serde_json::Value,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub job_id: JobId,
}

#[derive(Debug, Serialize)]
pub struct JobView {
    pub id: JobId,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub owner_id: UserId,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            job_type: job.job_type(),
            owner_id: job.owner_id,
            status: job.status,
            attempts: job.attempts,
            max_attempts: job.max_attempts,
            last_error: job.last_error.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub queued_jobs: usize,
    pub processing: bool,
}
