//! Webhook endpoints. Both always answer `200 {"received": true}`, even for
//! bodies that do not parse.

use axum::{body::Bytes, extract::Extension, Json};
use tracing::warn;

use autoflow_engine::webhooks::WebhookAck;
use autoflow_engine::Engine;

fn decode(body: &Bytes, endpoint: &'static str) -> Option<serde_json::Value> {
    match serde_json::from_slice(body) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(endpoint, error = %e, "webhook body is not JSON");
            None
        }
    }
}

pub async fn inbound_message(Extension(engine): Extension<Engine>, body: Bytes) -> Json<WebhookAck> {
    let Some(value) = decode(&body, "messages") else {
        return Json(WebhookAck::received());
    };
    // The flow run continues in the background; only the ack is returned.
    let dispatch = engine.inbound.handle_raw(value).await;
    Json(dispatch.ack)
}

pub async fn payment_event(Extension(engine): Extension<Engine>, body: Bytes) -> Json<WebhookAck> {
    let Some(value) = decode(&body, "payments") else {
        return Json(WebhookAck::received());
    };
    Json(engine.payments.handle_raw(value).await)
}
