//! In-process automation engine.
//!
//! - `jobs`: queue, retry policy, dispatch, and the single processing loop
//! - `flows`: keyword triggers and step interpretation
//! - `webhooks`: inbound message and payment entry points
//! - `collaborators`: interfaces to persistence, generation, media, messaging

pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod flows;
pub mod jobs;
pub mod webhooks;

pub use config::{ConfigError, EngineConfig};
pub use engine::Engine;
pub use error::{CollaboratorError, FlowStepError, HandlerError, QueueError};
pub use jobs::{JobExecutor, JobHandler, JobQueue, JobSink, ProcessingLoop, RetryController};
