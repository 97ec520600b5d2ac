//! Media synthesis: start a provider job, then poll it to completion.
//!
//! The poll is a small state machine (`queued → processing → done | error`)
//! driven by a fixed-interval ticker and bounded by a total wait. Dropping the
//! future cancels the poll.

use std::time::Duration;

use serde_json::json;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use autoflow_core::{MediaGenerationPayload, UserId};

use crate::collaborators::{
    Collaborators, EntityKind, MediaJobParams, MediaJobState, MediaJobStatus, MediaResult,
    MediaService,
};
use crate::error::HandlerError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum PollState {
    Queued,
    Processing,
    Done(MediaResult),
    Failed(String),
}

impl PollState {
    fn advance(&self, status: MediaJobStatus) -> PollState {
        match (self, status.state) {
            // Providers occasionally report a stale `queued` after picking the job up.
            (PollState::Processing, MediaJobState::Queued) => PollState::Processing,
            (_, MediaJobState::Queued) => PollState::Queued,
            (_, MediaJobState::Processing) => PollState::Processing,
            (_, MediaJobState::Done) => match status.result {
                Some(result) => PollState::Done(result),
                None => PollState::Failed("media job finished without a result".to_string()),
            },
            (_, MediaJobState::Error) => PollState::Failed(
                status
                    .error
                    .unwrap_or_else(|| "media synthesis failed".to_string()),
            ),
        }
    }
}

/// Polls a provider job until it reaches a terminal state or the wait runs out.
#[derive(Debug, Clone, Copy)]
pub struct MediaPoller {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl MediaPoller {
    /// A zero `interval` is raised to 1 ms; tokio tickers reject a zero period.
    pub fn new(interval: Duration, max_wait: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            max_wait,
        }
    }

    pub async fn wait(
        &self,
        service: &dyn MediaService,
        provider_job_id: &str,
    ) -> Result<MediaResult, HandlerError> {
        match tokio::time::timeout(self.max_wait, self.poll(service, provider_job_id)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(HandlerError::transient(format!(
                "media job {provider_job_id} not finished after {:?}",
                self.max_wait
            ))),
        }
    }

    async fn poll(
        &self,
        service: &dyn MediaService,
        provider_job_id: &str,
    ) -> Result<MediaResult, HandlerError> {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut state = PollState::Queued;
        loop {
            ticker.tick().await;
            let status = service.get_status(provider_job_id).await?;
            let next = state.advance(status);
            if next != state {
                debug!(provider_job_id, from = ?state, to = ?next, "media job state changed");
            }
            state = next;

            match &state {
                PollState::Done(result) => return Ok(result.clone()),
                PollState::Failed(reason) => return Err(HandlerError::transient(reason.clone())),
                PollState::Queued | PollState::Processing => {}
            }
        }
    }
}

/// Render a media asset and store its URL on the media record.
pub async fn generate_media(
    collaborators: &Collaborators,
    poller: &MediaPoller,
    owner_id: UserId,
    payload: &MediaGenerationPayload,
) -> Result<(), HandlerError> {
    let params = MediaJobParams {
        script: payload.script.clone(),
        avatar: payload.avatar.clone(),
        voice: payload.voice.clone(),
    };
    let provider_job_id = collaborators.media.create_job(&params).await?;

    let media_key = payload.media_id.to_string();
    collaborators
        .persistence
        .update_entity(
            EntityKind::Media,
            &media_key,
            json!({ "owner_id": owner_id, "provider_job_id": provider_job_id, "status": "rendering" }),
        )
        .await?;

    let result = poller.wait(collaborators.media.as_ref(), &provider_job_id).await?;

    collaborators
        .persistence
        .update_entity(
            EntityKind::Media,
            &media_key,
            json!({ "url": result.url, "duration_secs": result.duration_secs, "status": "ready" }),
        )
        .await?;
    Ok(())
}
