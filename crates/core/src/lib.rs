//! `autoflow-core` — data model shared by the engine and its entry points.
//!
//! This crate holds **pure data** (jobs, flows, inbound messages, identifiers).
//! Scheduling, retries and collaborator calls live in `autoflow-engine`.

pub mod entity;
pub mod error;
pub mod flow;
pub mod id;
pub mod job;
pub mod message;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use flow::{ContactFields, Flow, FlowStep};
pub use id::{ChannelId, EntityId, FlowId, JobId, UserId};
pub use job::{
    CampaignCreationPayload, CatalogImportPayload, CatalogItem, ContentGenerationPayload,
    GenerationOptions, Job, JobPayload, JobStatus, JobType, MediaGenerationPayload,
    MessageDeliveryPayload, PageGenerationPayload, DEFAULT_MAX_ATTEMPTS,
};
pub use message::InboundMessage;
