use serde_json::json;
use tracing::debug;

use autoflow_core::{CatalogImportPayload, UserId};

use crate::collaborators::{Collaborators, EntityKind};
use crate::error::HandlerError;

/// Upsert every catalog item as a product, then mark the catalog imported.
///
/// Products are keyed by SKU, so re-running a partially failed import is safe.
pub async fn import_catalog(
    collaborators: &Collaborators,
    owner_id: UserId,
    payload: &CatalogImportPayload,
) -> Result<(), HandlerError> {
    if payload.items.is_empty() {
        return Err(HandlerError::terminal("catalog contains no items"));
    }
    if let Some(item) = payload.items.iter().find(|i| i.sku.trim().is_empty()) {
        return Err(HandlerError::terminal(format!(
            "catalog item {:?} has a blank sku",
            item.title
        )));
    }

    for item in &payload.items {
        collaborators
            .persistence
            .update_entity(
                EntityKind::Product,
                &item.sku,
                json!({
                    "owner_id": owner_id,
                    "catalog_id": payload.catalog_id,
                    "title": item.title,
                    "price_cents": item.price_cents,
                    "description": item.description,
                }),
            )
            .await?;
    }

    collaborators
        .persistence
        .update_entity(
            EntityKind::Catalog,
            &payload.catalog_id.to_string(),
            json!({ "imported": payload.items.len(), "status": "imported" }),
        )
        .await?;

    debug!(catalog_id = %payload.catalog_id, items = payload.items.len(), "catalog imported");
    Ok(())
}
