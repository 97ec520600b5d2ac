use axum::{
    routing::{get, post},
    Router,
};

pub mod jobs;
pub mod system;
pub mod webhooks;

/// Router for every endpoint except `/health`.
pub fn router() -> Router {
    Router::new()
        .route("/webhooks/messages", post(webhooks::inbound_message))
        .route("/webhooks/payments", post(webhooks::payment_event))
        .route("/jobs", post(jobs::submit_job).get(jobs::list_jobs))
        .route("/jobs/:id", get(jobs::get_job))
}
