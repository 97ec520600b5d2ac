use serde_json::json;
use tracing::debug;

use autoflow_core::{MessageDeliveryPayload, UserId};

use crate::collaborators::{Collaborators, EntityKind};
use crate::error::HandlerError;

/// Send one outbound message and record the delivery.
pub async fn deliver_message(
    collaborators: &Collaborators,
    owner_id: UserId,
    payload: &MessageDeliveryPayload,
) -> Result<(), HandlerError> {
    let delivery = collaborators
        .messenger
        .send_message(&payload.channel_id, &payload.recipient, &payload.content)
        .await?;

    collaborators
        .persistence
        .update_entity(
            EntityKind::Message,
            &delivery.delivery_id,
            json!({
                "owner_id": owner_id,
                "channel_id": payload.channel_id,
                "recipient": payload.recipient,
                "content": payload.content,
                "flow_id": payload.flow_id,
                "status": "sent",
            }),
        )
        .await?;

    debug!(delivery_id = %delivery.delivery_id, channel_id = %payload.channel_id, "message delivered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use autoflow_core::ChannelId;

    use super::*;
    use crate::collaborators::in_memory::{InMemoryCollaborators, RecordingMessenger};
    use crate::error::CollaboratorError;

    fn payload() -> MessageDeliveryPayload {
        MessageDeliveryPayload {
            channel_id: ChannelId::new("wa-1"),
            recipient: "+15550100".to_string(),
            content: "Our price is $10".to_string(),
            flow_id: None,
        }
    }

    #[tokio::test]
    async fn sends_and_records_delivery() {
        let c = InMemoryCollaborators::new();

        deliver_message(&c.bundle(), UserId::new(), &payload()).await.unwrap();

        let sent = c.messenger.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "+15550100");
        let record = c.persistence.entity(EntityKind::Message, "dlv-1").unwrap();
        assert_eq!(record["status"], "sent");
    }

    #[tokio::test]
    async fn delivery_outage_fails_the_attempt() {
        let c = InMemoryCollaborators::new().with_messenger(RecordingMessenger::failing(
            CollaboratorError::unavailable("messenger", "timeout talking to provider"),
        ));

        let err = deliver_message(&c.bundle(), UserId::new(), &payload()).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(c.persistence.entity_count(EntityKind::Message), 0);
    }
}
