use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use autoflow_engine::QueueError;

pub fn queue_error_to_response(err: QueueError) -> axum::response::Response {
    match err {
        QueueError::Rejected(e) => json_error(StatusCode::BAD_REQUEST, "job_rejected", e.to_string()),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
