use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use autoflow_core::JobId;
use autoflow_engine::Engine;

use crate::app::{dto, errors};

pub async fn submit_job(
    Extension(engine): Extension<Engine>,
    Json(body): Json<dto::SubmitJobRequest>,
) -> axum::response::Response {
    match engine.jobs.enqueue_raw(&body.job_type, body.owner_id, body.payload) {
        Ok(job_id) => (StatusCode::ACCEPTED, Json(dto::SubmitJobResponse { job_id })).into_response(),
        Err(e) => errors::queue_error_to_response(e),
    }
}

pub async fn list_jobs(Extension(engine): Extension<Engine>) -> Json<Vec<dto::JobView>> {
    let jobs = engine.jobs.queue().snapshot();
    Json(jobs.iter().map(dto::JobView::from).collect())
}

pub async fn get_job(
    Extension(engine): Extension<Engine>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: JobId = match id.parse() {
        Ok(id) => id,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid job id"),
    };

    match engine.jobs.queue().get(id) {
        Some(job) => Json(dto::JobView::from(&job)).into_response(),
        // Finished jobs leave the queue; their outcome lives on the target record.
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "job is not queued"),
    }
}
