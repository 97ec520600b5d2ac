use serde_json::json;
use tracing::debug;

use autoflow_core::{ContentGenerationPayload, UserId};

use crate::collaborators::{Collaborators, EntityKind};
use crate::error::HandlerError;

/// Generate text for a content record and store it on the record.
pub async fn generate_content(
    collaborators: &Collaborators,
    owner_id: UserId,
    payload: &ContentGenerationPayload,
) -> Result<(), HandlerError> {
    let user = collaborators.persistence.get_user(owner_id).await?;

    let generation = collaborators
        .generator
        .generate(&payload.prompt, &payload.options)
        .await?;
    if generation.content.trim().is_empty() {
        return Err(HandlerError::transient("generator returned empty content"));
    }

    collaborators
        .persistence
        .update_entity(
            EntityKind::Content,
            &payload.content_id.to_string(),
            json!({
                "owner_id": user.id,
                "body": generation.content,
                "usage": generation.usage,
                "status": "ready",
            }),
        )
        .await?;

    debug!(
        content_id = %payload.content_id,
        completion_tokens = generation.usage.completion_tokens,
        "content generated"
    );
    Ok(())
}
