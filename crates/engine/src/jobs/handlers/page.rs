use serde_json::json;

use autoflow_core::{GenerationOptions, PageGenerationPayload, UserId};

use crate::collaborators::{Collaborators, EntityKind};
use crate::error::HandlerError;

/// Generate landing-page markup and publish it.
pub async fn generate_page(
    collaborators: &Collaborators,
    owner_id: UserId,
    payload: &PageGenerationPayload,
) -> Result<(), HandlerError> {
    let prompt = format!(
        "Create a single-page HTML landing page for \"{}\". About the business: {}",
        payload.business_name, payload.description
    );
    let generation = collaborators
        .generator
        .generate(&prompt, &GenerationOptions::default())
        .await?;

    collaborators
        .persistence
        .update_entity(
            EntityKind::Page,
            &payload.page_id.to_string(),
            json!({
                "owner_id": owner_id,
                "title": payload.business_name,
                "html": generation.content,
                "status": "published",
            }),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use autoflow_core::EntityId;

    use super::*;
    use crate::collaborators::in_memory::InMemoryCollaborators;

    #[tokio::test]
    async fn publishes_generated_markup() {
        let c = InMemoryCollaborators::new();
        let p = PageGenerationPayload {
            page_id: EntityId::new(),
            business_name: "Rosa's Bakery".to_string(),
            description: "Fresh bread every morning".to_string(),
        };

        generate_page(&c.bundle(), UserId::new(), &p).await.unwrap();

        let record = c.persistence.entity(EntityKind::Page, &p.page_id.to_string()).unwrap();
        assert_eq!(record["status"], "published");
        assert_eq!(record["title"], "Rosa's Bakery");
    }
}
