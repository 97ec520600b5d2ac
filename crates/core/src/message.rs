//! Inbound channel messages (webhook payloads after decoding).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::ChannelId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub channel_id: ChannelId,
    /// Sender address on the channel (phone number, handle...).
    pub sender: String,
    pub body: String,
    #[serde(default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(channel_id: ChannelId, sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            channel_id,
            sender: sender.into(),
            body: body.into(),
            received_at: Utc::now(),
        }
    }
}
