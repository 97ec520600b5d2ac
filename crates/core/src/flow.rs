//! Flows: stored, trigger-activated automation scripts.
//!
//! Flows are authored elsewhere and are read-only to the engine.

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::id::{ChannelId, FlowId, UserId};

/// Contact record fields collected by an `AddContact` step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// One step of a flow script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlowStep {
    /// Pause this flow run.
    Delay { seconds: u64 },
    /// Reply to the sender of the triggering message.
    Message { content: String },
    /// Create a CRM contact.
    AddContact {
        #[serde(default)]
        fields: ContactFields,
    },
}

impl FlowStep {
    pub fn kind(&self) -> &'static str {
        match self {
            FlowStep::Delay { .. } => "delay",
            FlowStep::Message { .. } => "message",
            FlowStep::AddContact { .. } => "add_contact",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
    pub id: FlowId,
    pub name: String,
    pub owner_id: UserId,
    pub target_channel_id: ChannelId,
    /// Case-insensitive substrings matched against inbound message bodies.
    pub trigger_keywords: Vec<String>,
    pub steps: Vec<FlowStep>,
    pub is_active: bool,
}

impl Flow {
    pub fn new(
        name: impl Into<String>,
        owner_id: UserId,
        target_channel_id: ChannelId,
        trigger_keywords: impl IntoIterator<Item = impl Into<String>>,
        steps: Vec<FlowStep>,
    ) -> Self {
        Self {
            id: FlowId::new(),
            name: name.into(),
            owner_id,
            target_channel_id,
            trigger_keywords: trigger_keywords.into_iter().map(Into::into).collect(),
            steps,
            is_active: true,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

impl Entity for Flow {
    type Id = FlowId;

    fn id(&self) -> &FlowId {
        &self.id
    }
}
