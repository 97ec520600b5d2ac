//! In-memory collaborators for tests/dev.
//!
//! - No IO
//! - Responses can be scripted per call
//! - Every call is recorded for later inspection

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use autoflow_core::{ChannelId, EntityId, Flow, GenerationOptions, InboundMessage, UserId};

use super::{
    ActivityEvent, Collaborators, ContentGenerator, Delivery, EntityKind, Generation,
    MediaJobParams, MediaJobState, MediaJobStatus, MediaResult, MediaService, Messenger,
    NewContact, Persistence, TokenUsage, UserRecord,
};
use crate::error::CollaboratorError;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct PersistenceState {
    users: HashMap<UserId, UserRecord>,
    entities: HashMap<(EntityKind, String), serde_json::Value>,
    contacts: Vec<(EntityId, NewContact)>,
    activity: Vec<ActivityEvent>,
    inbound: Vec<InboundMessage>,
    flows: Vec<Flow>,
    contact_failure: Option<CollaboratorError>,
    inbound_failure: Option<CollaboratorError>,
}

/// In-memory persistence for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    state: Mutex<PersistenceState>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a user and return its id.
    pub fn add_user(&self, email: impl Into<String>) -> UserId {
        let id = UserId::new();
        lock(&self.state).users.insert(
            id,
            UserRecord {
                id,
                email: email.into(),
                plan: None,
                credits: 0,
            },
        );
        id
    }

    /// Append a flow; flows are returned in insertion order.
    pub fn add_flow(&self, flow: Flow) {
        lock(&self.state).flows.push(flow);
    }

    /// Make every subsequent `create_contact` call fail with `err`.
    pub fn fail_contacts_with(&self, err: CollaboratorError) {
        lock(&self.state).contact_failure = Some(err);
    }

    /// Make every subsequent `record_inbound_message` call fail with `err`.
    pub fn fail_inbound_with(&self, err: CollaboratorError) {
        lock(&self.state).inbound_failure = Some(err);
    }

    pub fn user(&self, id: UserId) -> Option<UserRecord> {
        lock(&self.state).users.get(&id).cloned()
    }

    pub fn entity(&self, kind: EntityKind, id: &str) -> Option<serde_json::Value> {
        lock(&self.state).entities.get(&(kind, id.to_string())).cloned()
    }

    pub fn entity_count(&self, kind: EntityKind) -> usize {
        lock(&self.state)
            .entities
            .keys()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    pub fn contacts(&self) -> Vec<NewContact> {
        lock(&self.state)
            .contacts
            .iter()
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn activity(&self) -> Vec<ActivityEvent> {
        lock(&self.state).activity.clone()
    }

    pub fn inbound_messages(&self) -> Vec<InboundMessage> {
        lock(&self.state).inbound.clone()
    }
}

#[async_trait]
impl Persistence for InMemoryPersistence {
    async fn get_user(&self, id: UserId) -> Result<UserRecord, CollaboratorError> {
        self.user(id)
            .ok_or_else(|| CollaboratorError::not_found("user", id))
    }

    async fn update_entity(
        &self,
        kind: EntityKind,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<(), CollaboratorError> {
        let mut state = lock(&self.state);
        if kind == EntityKind::User {
            let user = id.parse::<UserId>().ok().and_then(|uid| state.users.get_mut(&uid));
            if let (Some(user), Some(plan)) = (user, patch.get("plan")) {
                user.plan = plan.as_str().map(str::to_string);
            }
        }
        let entry = state
            .entities
            .entry((kind, id.to_string()))
            .or_insert_with(|| serde_json::json!({}));

        match (entry.as_object_mut(), patch) {
            (Some(existing), serde_json::Value::Object(fields)) => existing.extend(fields),
            (_, other) => *entry = other,
        }
        Ok(())
    }

    async fn create_contact(&self, contact: NewContact) -> Result<EntityId, CollaboratorError> {
        let mut state = lock(&self.state);
        if let Some(err) = &state.contact_failure {
            return Err(err.clone());
        }
        let id = EntityId::new();
        state.contacts.push((id, contact));
        Ok(id)
    }

    async fn log_activity(&self, event: ActivityEvent) -> Result<(), CollaboratorError> {
        lock(&self.state).activity.push(event);
        Ok(())
    }

    async fn record_inbound_message(&self, message: &InboundMessage) -> Result<(), CollaboratorError> {
        let mut state = lock(&self.state);
        if let Some(err) = &state.inbound_failure {
            return Err(err.clone());
        }
        state.inbound.push(message.clone());
        Ok(())
    }

    async fn flows_for_channel(&self, channel: &ChannelId) -> Result<Vec<Flow>, CollaboratorError> {
        Ok(lock(&self.state)
            .flows
            .iter()
            .filter(|f| &f.target_channel_id == channel)
            .cloned()
            .collect())
    }

    async fn grant_credits(&self, owner_id: UserId, amount: u64) -> Result<u64, CollaboratorError> {
        let mut state = lock(&self.state);
        let user = state
            .users
            .get_mut(&owner_id)
            .ok_or_else(|| CollaboratorError::not_found("user", owner_id))?;
        user.credits = user.credits.saturating_add(amount);
        Ok(user.credits)
    }
}

#[derive(Debug)]
enum Fallback {
    Echo,
    Fail(CollaboratorError),
}

/// Generator that replays scripted responses, then falls back to echo/fail.
#[derive(Debug)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<Generation, CollaboratorError>>>,
    fallback: Fallback,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    /// Answers every prompt with `generated: <prompt>`.
    pub fn echo() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Fallback::Echo,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Fails every call with `err`.
    pub fn failing(err: CollaboratorError) -> Self {
        Self {
            fallback: Fallback::Fail(err),
            ..Self::echo()
        }
    }

    /// Queue a one-off response consumed by the next call.
    pub fn then(self, response: Result<Generation, CollaboratorError>) -> Self {
        lock(&self.script).push_back(response);
        self
    }

    pub fn calls(&self) -> usize {
        lock(&self.prompts).len()
    }

    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<Generation, CollaboratorError> {
        lock(&self.prompts).push(prompt.to_string());

        if let Some(scripted) = lock(&self.script).pop_front() {
            return scripted;
        }

        match &self.fallback {
            Fallback::Echo => Ok(Generation {
                content: format!("generated: {prompt}"),
                usage: TokenUsage {
                    prompt_tokens: prompt.split_whitespace().count() as u32,
                    completion_tokens: 16,
                },
            }),
            Fallback::Fail(err) => Err(err.clone()),
        }
    }
}

/// Media service that walks every job through a scripted list of statuses.
///
/// The last status repeats once the script is exhausted.
#[derive(Debug)]
pub struct ScriptedMediaService {
    statuses: Mutex<VecDeque<MediaJobStatus>>,
    last: Mutex<MediaJobStatus>,
    created: Mutex<Vec<MediaJobParams>>,
    polls: AtomicUsize,
}

impl ScriptedMediaService {
    pub fn with_statuses(statuses: impl IntoIterator<Item = MediaJobStatus>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into_iter().collect()),
            last: Mutex::new(status(MediaJobState::Queued)),
            created: Mutex::new(Vec::new()),
            polls: AtomicUsize::new(0),
        }
    }

    /// Queued, `processing_polls` × Processing, then Done with `url`.
    pub fn completing(processing_polls: usize, url: impl Into<String>) -> Self {
        let mut statuses = vec![status(MediaJobState::Queued)];
        statuses.extend((0..processing_polls).map(|_| status(MediaJobState::Processing)));
        statuses.push(MediaJobStatus {
            state: MediaJobState::Done,
            result: Some(MediaResult {
                url: url.into(),
                duration_secs: Some(30),
            }),
            error: None,
        });
        Self::with_statuses(statuses)
    }

    /// Processing, then Error with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_statuses([
            status(MediaJobState::Processing),
            MediaJobStatus {
                state: MediaJobState::Error,
                result: None,
                error: Some(message.into()),
            },
        ])
    }

    /// Never leaves Processing.
    pub fn stuck() -> Self {
        Self::with_statuses([status(MediaJobState::Processing)])
    }

    pub fn created_jobs(&self) -> Vec<MediaJobParams> {
        lock(&self.created).clone()
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

fn status(state: MediaJobState) -> MediaJobStatus {
    MediaJobStatus {
        state,
        result: None,
        error: None,
    }
}

#[async_trait]
impl MediaService for ScriptedMediaService {
    async fn create_job(&self, params: &MediaJobParams) -> Result<String, CollaboratorError> {
        let mut created = lock(&self.created);
        created.push(params.clone());
        Ok(format!("media-{}", created.len()))
    }

    async fn get_status(&self, _provider_job_id: &str) -> Result<MediaJobStatus, CollaboratorError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let mut last = lock(&self.last);
        if let Some(next) = lock(&self.statuses).pop_front() {
            *last = next;
        }
        Ok(last.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub channel_id: ChannelId,
    pub recipient: String,
    pub content: String,
}

/// Messenger that records every message it is asked to send.
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<SentMessage>>,
    failure: Option<CollaboratorError>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(err: CollaboratorError) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failure: Some(err),
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_message(
        &self,
        channel: &ChannelId,
        recipient: &str,
        content: &str,
    ) -> Result<Delivery, CollaboratorError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        let mut sent = lock(&self.sent);
        sent.push(SentMessage {
            channel_id: channel.clone(),
            recipient: recipient.to_string(),
            content: content.to_string(),
        });
        Ok(Delivery {
            delivery_id: format!("dlv-{}", sent.len()),
        })
    }
}

/// Concrete in-memory handles, kept alongside the type-erased bundle.
#[derive(Debug, Clone)]
pub struct InMemoryCollaborators {
    pub persistence: Arc<InMemoryPersistence>,
    pub generator: Arc<ScriptedGenerator>,
    pub media: Arc<ScriptedMediaService>,
    pub messenger: Arc<RecordingMessenger>,
}

impl InMemoryCollaborators {
    /// Echo generator, media that completes after one processing poll,
    /// recording messenger.
    pub fn new() -> Self {
        Self {
            persistence: InMemoryPersistence::arc(),
            generator: Arc::new(ScriptedGenerator::echo()),
            media: Arc::new(ScriptedMediaService::completing(1, "https://media.local/video.mp4")),
            messenger: Arc::new(RecordingMessenger::new()),
        }
    }

    pub fn with_generator(mut self, generator: ScriptedGenerator) -> Self {
        self.generator = Arc::new(generator);
        self
    }

    pub fn with_media(mut self, media: ScriptedMediaService) -> Self {
        self.media = Arc::new(media);
        self
    }

    pub fn with_messenger(mut self, messenger: RecordingMessenger) -> Self {
        self.messenger = Arc::new(messenger);
        self
    }

    pub fn bundle(&self) -> Collaborators {
        Collaborators {
            persistence: self.persistence.clone(),
            generator: self.generator.clone(),
            media: self.media.clone(),
            messenger: self.messenger.clone(),
        }
    }
}

impl Default for InMemoryCollaborators {
    fn default() -> Self {
        Self::new()
    }
}
