pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;
pub mod session;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use crate::core::{config::Settings, state::AppState, telemetry};
use crate::services::ai_grading::AiGradingService;

async fn bootstrap(service: &'static str) -> anyhow::Result<AppState> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings, service)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let essays = Arc::new(AiGradingService::from_settings(&settings)?);
    Ok(AppState::new(settings, db_pool, essays))
}

pub async fn run() -> anyhow::Result<()> {
    let state = bootstrap("verso-api").await?;
    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "Verso API listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            core::shutdown::shutdown_signal().await;
        })
        .await?;

    state.db().close().await;
    tracing::info!("Database pool closed");

    Ok(())
}

pub async fn run_worker() -> anyhow::Result<()> {
    let state = bootstrap("verso-worker").await?;
    let result = tasks::scheduler::run(state.clone()).await;
    state.db().close().await;
    result
}
