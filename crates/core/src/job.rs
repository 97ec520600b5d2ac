//! Jobs: queued, retryable units of asynchronous work.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::DomainError;
use crate::id::{ChannelId, EntityId, FlowId, JobId, UserId};

/// Attempt ceiling applied when the caller does not configure one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Job type, used for routing and for decoding raw submissions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    ContentGeneration,
    MediaGeneration,
    CampaignCreation,
    PageGeneration,
    MessageDelivery,
    CatalogImport,
}

impl JobType {
    pub const ALL: [JobType; 6] = [
        JobType::ContentGeneration,
        JobType::MediaGeneration,
        JobType::CampaignCreation,
        JobType::PageGeneration,
        JobType::MessageDelivery,
        JobType::CatalogImport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::ContentGeneration => "content-generation",
            JobType::MediaGeneration => "media-generation",
            JobType::CampaignCreation => "campaign-creation",
            JobType::PageGeneration => "page-generation",
            JobType::MessageDelivery => "message-delivery",
            JobType::CatalogImport => "catalog-import",
        }
    }
}

impl core::fmt::Display for JobType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::UnknownJobType(s.to_string()))
    }
}

/// Tuning knobs forwarded to the generation service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentGenerationPayload {
    pub content_id: EntityId,
    pub prompt: String,
    #[serde(default)]
    pub options: GenerationOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaGenerationPayload {
    pub media_id: EntityId,
    pub script: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignCreationPayload {
    pub campaign_id: EntityId,
    pub product_name: String,
    pub platform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    pub daily_budget_cents: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageGenerationPayload {
    pub page_id: EntityId,
    pub business_name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDeliveryPayload {
    pub channel_id: ChannelId,
    pub recipient: String,
    pub content: String,
    /// Flow that produced this message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_id: Option<FlowId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub sku: String,
    pub title: String,
    pub price_cents: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogImportPayload {
    pub catalog_id: EntityId,
    pub items: Vec<CatalogItem>,
}

/// Job payload, one variant per job type.
///
/// The variant *is* the job type, so dispatch is an exhaustive `match`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum JobPayload {
    ContentGeneration(ContentGenerationPayload),
    MediaGeneration(MediaGenerationPayload),
    CampaignCreation(CampaignCreationPayload),
    PageGeneration(PageGenerationPayload),
    MessageDelivery(MessageDeliveryPayload),
    CatalogImport(CatalogImportPayload),
}

impl JobPayload {
    pub fn job_type(&self) -> JobType {
        match self {
            JobPayload::ContentGeneration(_) => JobType::ContentGeneration,
            JobPayload::MediaGeneration(_) => JobType::MediaGeneration,
            JobPayload::CampaignCreation(_) => JobType::CampaignCreation,
            JobPayload::PageGeneration(_) => JobType::PageGeneration,
            JobPayload::MessageDelivery(_) => JobType::MessageDelivery,
            JobPayload::CatalogImport(_) => JobType::CatalogImport,
        }
    }

    /// Decode an untyped submission (type name + JSON body).
    pub fn decode(type_name: &str, body: serde_json::Value) -> Result<Self, DomainError> {
        let job_type: JobType = type_name.parse()?;
        let tagged = serde_json::json!({ "type": job_type.as_str(), "payload": body });
        let payload: JobPayload = serde_json::from_value(tagged)
            .map_err(|e| DomainError::malformed(job_type.as_str(), e.to_string()))?;
        payload.validate()?;
        Ok(payload)
    }

    /// Reject payloads whose required text fields are blank.
    pub fn validate(&self) -> Result<(), DomainError> {
        let required: Vec<(&str, &str)> = match self {
            JobPayload::ContentGeneration(p) => vec![("prompt", p.prompt.as_str())],
            JobPayload::MediaGeneration(p) => vec![("script", p.script.as_str())],
            JobPayload::CampaignCreation(p) => vec![
                ("product_name", p.product_name.as_str()),
                ("platform", p.platform.as_str()),
            ],
            JobPayload::PageGeneration(p) => vec![("business_name", p.business_name.as_str())],
            JobPayload::MessageDelivery(p) => vec![
                ("recipient", p.recipient.as_str()),
                ("content", p.content.as_str()),
            ],
            JobPayload::CatalogImport(_) => Vec::new(),
        };

        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(DomainError::malformed(
                self.job_type().as_str(),
                format!("`{field}` must not be blank"),
            )),
            None => Ok(()),
        }
    }
}

/// Job lifecycle status.
///
/// `Completed` and `Failed` are terminal; a job reaching either is removed
/// from the queue by the processing loop.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// A queued unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub owner_id: UserId,
    pub payload: JobPayload,
    pub status: JobStatus,
    /// Attempts started so far (starts at 0).
    pub attempts: u32,
    pub max_attempts: u32,
    /// Error of the most recent failed attempt.
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a pending job. `max_attempts` is clamped to at least one.
    pub fn new(owner_id: UserId, payload: JobPayload, max_attempts: u32) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            owner_id,
            payload,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts: max_attempts.max(1),
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn job_type(&self) -> JobType {
        self.payload.job_type()
    }

    /// Pending and with attempt budget left.
    pub fn is_eligible(&self) -> bool {
        self.status == JobStatus::Pending && self.attempts < self.max_attempts
    }

    /// Attempt budget is used up.
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Start a new attempt.
    pub fn mark_processing(&mut self) -> Result<(), DomainError> {
        if !self.is_eligible() {
            return Err(DomainError::validation(format!(
                "job {} is not eligible (status {:?}, attempts {}/{})",
                self.id, self.status, self.attempts, self.max_attempts
            )));
        }
        self.status = JobStatus::Processing;
        self.attempts += 1;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_completed(&mut self) {
        self.status = JobStatus::Completed;
        self.updated_at = Utc::now();
    }

    /// Record a failed attempt that will be retried.
    pub fn mark_retrying(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Pending;
        self.last_error = Some(error.into());
        self.updated_at = Utc::now();
    }

    /// Record the final failed attempt.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.last_error = Some(error.into());
        self.updated_at = Utc::now();
    }
}

impl Entity for Job {
    type Id = JobId;

    fn id(&self) -> &JobId {
        &self.id
    }
}
