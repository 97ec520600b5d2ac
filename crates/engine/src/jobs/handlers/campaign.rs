use serde_json::json;
use tracing::debug;

use autoflow_core::{CampaignCreationPayload, GenerationOptions, UserId};

use crate::collaborators::{Collaborators, EntityKind};
use crate::error::HandlerError;

fn ad_copy_prompt(payload: &CampaignCreationPayload) -> String {
    let mut prompt = format!(
        "Write short ad copy for {} to run on {}.",
        payload.product_name, payload.platform
    );
    if let Some(audience) = &payload.audience {
        prompt.push_str(&format!(" Target audience: {audience}."));
    }
    prompt
}

/// Generate ad copy and activate the campaign record.
pub async fn create_campaign(
    collaborators: &Collaborators,
    owner_id: UserId,
    payload: &CampaignCreationPayload,
) -> Result<(), HandlerError> {
    if payload.daily_budget_cents == 0 {
        return Err(HandlerError::terminal("campaign budget must be positive"));
    }

    let options = GenerationOptions {
        max_tokens: Some(120),
        tone: Some("persuasive".to_string()),
        ..GenerationOptions::default()
    };
    let generation = collaborators
        .generator
        .generate(&ad_copy_prompt(payload), &options)
        .await?;

    collaborators
        .persistence
        .update_entity(
            EntityKind::Campaign,
            &payload.campaign_id.to_string(),
            json!({
                "owner_id": owner_id,
                "ad_copy": generation.content,
                "platform": payload.platform,
                "daily_budget_cents": payload.daily_budget_cents,
                "status": "active",
            }),
        )
        .await?;

    debug!(campaign_id = %payload.campaign_id, platform = %payload.platform, "campaign created");
    Ok(())
}
