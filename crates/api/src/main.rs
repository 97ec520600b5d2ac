use anyhow::Context;

use autoflow_api::config::ApiConfig;
use autoflow_engine::collaborators::in_memory::InMemoryCollaborators;
use autoflow_engine::{Engine, EngineConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    autoflow_observability::init();

    let engine_config = EngineConfig::from_env().context("invalid engine configuration")?;
    let api_config = ApiConfig::from_env().context("invalid server configuration")?;

    tracing::warn!("using in-memory collaborators; nothing is persisted across restarts");
    let collaborators = InMemoryCollaborators::new();
    let engine =
        Engine::new(engine_config, collaborators.bundle()).context("invalid engine configuration")?;

    let app = autoflow_api::app::build_app(engine.clone());

    let listener = tokio::net::TcpListener::bind(api_config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", api_config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!(queued = engine.jobs.queue().len(), "draining job queue");
    engine.jobs.wait_idle().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
