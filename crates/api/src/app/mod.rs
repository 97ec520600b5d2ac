//! HTTP application wiring (Axum router + engine handle).
//!
//! - `routes/`: HTTP handlers, one file per area
//! - `dto.rs`: request/response bodies
//! - `errors.rs`: consistent error responses

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use autoflow_engine::Engine;

pub mod dto;
pub mod errors;
pub mod routes;

/// Build the full HTTP router around an already wired engine.
pub fn build_app(engine: Engine) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(ServiceBuilder::new().layer(Extension(engine)))
}
