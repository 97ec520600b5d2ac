//! Job dispatch: payload variant → handler routine.

use async_trait::async_trait;

use autoflow_core::{Job, JobPayload};

use super::handlers::{campaign, catalog, content, media, messaging, page};
use crate::collaborators::Collaborators;
use crate::config::EngineConfig;
use crate::error::HandlerError;

/// Runs one attempt of a job.
///
/// The processing loop only sees this trait, which keeps it testable with
/// scripted handlers.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, job: &Job) -> Result<(), HandlerError>;
}

/// Production dispatcher over the collaborator bundle.
#[derive(Debug, Clone)]
pub struct JobExecutor {
    collaborators: Collaborators,
    media_poller: media::MediaPoller,
}

impl JobExecutor {
    pub fn new(collaborators: Collaborators, config: &EngineConfig) -> Self {
        Self {
            collaborators,
            media_poller: media::MediaPoller::new(
                config.media_poll_interval(),
                config.media_max_wait(),
            ),
        }
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }
}

#[async_trait]
impl JobHandler for JobExecutor {
    async fn handle(&self, job: &Job) -> Result<(), HandlerError> {
        let c = &self.collaborators;
        let owner = job.owner_id;

        match &job.payload {
            JobPayload::ContentGeneration(p) => content::generate_content(c, owner, p).await,
            JobPayload::MediaGeneration(p) => {
                media::generate_media(c, &self.media_poller, owner, p).await
            }
            JobPayload::CampaignCreation(p) => campaign::create_campaign(c, owner, p).await,
            JobPayload::PageGeneration(p) => page::generate_page(c, owner, p).await,
            JobPayload::MessageDelivery(p) => messaging::deliver_message(c, owner, p).await,
            JobPayload::CatalogImport(p) => catalog::import_catalog(c, owner, p).await,
        }
    }
}
