pub mod api;
pub mod client;
pub mod config;
pub mod engine;
pub mod errors;
pub mod export;
pub mod identity;
pub mod metrics_defs;
pub mod price;
pub mod query;
pub mod types;

#[cfg(test)]
mod testutils;

use api::ApiState;
use client::RemoteEngine;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(thiserror::Error, Debug)]
pub enum MeteringApiError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    InvalidConfig(#[from] config::ValidationError),
    #[error("could not build engine client: {0}")]
    EngineClient(#[from] reqwest::Error),
}

/// Runs the API and admin listeners until shutdown.
pub async fn run(config: config::Config) -> Result<(), MeteringApiError> {
    config.validate()?;

    let engine = RemoteEngine::new(&config.engine)?;
    tracing::info!(engine = %config.engine.url, "using remote metering engine");

    let state = ApiState::new(Arc::new(engine), config.metering, config.identity);

    let ready = Arc::new(AtomicBool::new(false));
    let is_ready = ready.clone();
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::new(move || is_ready.load(Ordering::Relaxed)),
    );
    let api_task = api::serve(&config.listener, state, ready);

    // The admin listener never returns on its own; the API decides when to stop.
    tokio::select! {
        res = api_task => res?,
        res = admin_task => res?,
    }
    Ok(())
}
