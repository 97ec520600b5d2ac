use axum::{extract::Extension, Json};

use autoflow_engine::Engine;

use crate::app::dto::HealthResponse;

pub async fn health(Extension(engine): Extension<Engine>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        queued_jobs: engine.jobs.queue().len(),
        processing: engine.jobs.is_running(),
    })
}
