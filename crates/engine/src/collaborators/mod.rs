//! Narrow interfaces to the services the engine drives.
//!
//! Implementations live outside this crate; `in_memory` provides doubles for
//! tests and local runs.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use autoflow_core::{
    ChannelId, ContactFields, EntityId, Flow, GenerationOptions, InboundMessage, JobId, UserId,
};

use crate::error::CollaboratorError;

pub mod in_memory;

/// Record kinds handlers write to through [`Persistence::update_entity`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Content,
    Media,
    Campaign,
    Page,
    Message,
    Product,
    Catalog,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Content => "content",
            EntityKind::Media => "media",
            EntityKind::Campaign => "campaign",
            EntityKind::Page => "page",
            EntityKind::Message => "message",
            EntityKind::Product => "product",
            EntityKind::Catalog => "catalog",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(default)]
    pub credits: u64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    JobFailed,
    SubscriptionChanged,
    CreditsGranted,
    PaymentFailed,
}

/// Entry in the user-visible activity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub owner_id: UserId,
    pub kind: ActivityKind,
    pub summary: String,
    #[serde(default)]
    pub details: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl ActivityEvent {
    pub fn new(owner_id: UserId, kind: ActivityKind, summary: impl Into<String>) -> Self {
        Self {
            owner_id,
            kind,
            summary: summary.into(),
            details: serde_json::Value::Null,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn job_id(&self) -> Option<JobId> {
        self.details
            .get("job_id")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// CRM contact created by a flow step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContact {
    pub owner_id: UserId,
    pub channel_id: ChannelId,
    pub fields: ContactFields,
    /// Provenance tag: the name of the flow that created the contact.
    pub source: String,
}

#[async_trait]
pub trait Persistence: Send + Sync + 'static {
    async fn get_user(&self, id: UserId) -> Result<UserRecord, CollaboratorError>;

    /// Merge `patch` (a JSON object) into the record identified by `kind`/`id`.
    async fn update_entity(
        &self,
        kind: EntityKind,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<(), CollaboratorError>;

    async fn create_contact(&self, contact: NewContact) -> Result<EntityId, CollaboratorError>;

    async fn log_activity(&self, event: ActivityEvent) -> Result<(), CollaboratorError>;

    async fn record_inbound_message(&self, message: &InboundMessage) -> Result<(), CollaboratorError>;

    /// Flows bound to `channel`, in stored order (active or not).
    async fn flows_for_channel(&self, channel: &ChannelId) -> Result<Vec<Flow>, CollaboratorError>;

    /// Add credits to the user's balance; returns the new balance.
    async fn grant_credits(&self, owner_id: UserId, amount: u64) -> Result<u64, CollaboratorError>;
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
    pub content: String,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait ContentGenerator: Send + Sync + 'static {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Generation, CollaboratorError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaJobParams {
    pub script: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaJobState {
    Queued,
    Processing,
    Done,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaResult {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaJobStatus {
    pub state: MediaJobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<MediaResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Long-running media synthesis (video, voice).
#[async_trait]
pub trait MediaService: Send + Sync + 'static {
    /// Start a synthesis job; returns the provider's job id.
    async fn create_job(&self, params: &MediaJobParams) -> Result<String, CollaboratorError>;

    async fn get_status(&self, provider_job_id: &str) -> Result<MediaJobStatus, CollaboratorError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub delivery_id: String,
}

#[async_trait]
pub trait Messenger: Send + Sync + 'static {
    async fn send_message(
        &self,
        channel: &ChannelId,
        recipient: &str,
        content: &str,
    ) -> Result<Delivery, CollaboratorError>;
}

/// Bundle of collaborator handles shared by handlers and gateways.
#[derive(Clone)]
pub struct Collaborators {
    pub persistence: Arc<dyn Persistence>,
    pub generator: Arc<dyn ContentGenerator>,
    pub media: Arc<dyn MediaService>,
    pub messenger: Arc<dyn Messenger>,
}

impl core::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
