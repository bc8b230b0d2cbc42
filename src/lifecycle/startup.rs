//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize diagnostics, the structured logger and the metrics registry
//! - Bind the listener and hand over to the HTTP server
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listener binds last (traffic only when ready)

use std::future::Future;
use std::io;
use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::{load_config, AppConfig, ConfigError};
use crate::http::{AppState, HttpServer};
use crate::lifecycle::{signals, ShutdownSignal, StopReason};
use crate::observability::diagnostics::init_diagnostics;
use crate::observability::{Fields, LogLevel, Logger, Metrics, MetricsError};
use crate::random::ThreadRandom;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] io::Error),
}

/// Build production state: stdout logger, fresh registry, thread RNG.
pub fn build_state(config: AppConfig) -> Result<AppState, StartupError> {
    let min_level = LogLevel::parse(&config.logging.level).unwrap_or(LogLevel::Debug);
    let logger = Logger::stdout(config.service.name.clone(), min_level);
    let metrics = Metrics::new()?;
    Ok(AppState::new(config, logger, metrics, Arc::new(ThreadRandom)))
}

/// Load configuration, start serving, and stop on SIGTERM/SIGINT.
pub async fn launch(config_path: Option<&Path>) -> Result<StopReason, StartupError> {
    let config = load_config(config_path)?;
    init_diagnostics(&config.logging.diagnostics);

    tracing::info!(
        bind_address = %config.listener.bind_address(),
        drain_timeout_secs = config.shutdown.drain_timeout_secs,
        "Configuration loaded"
    );

    let state = build_state(config)?;
    serve(state, signals::wait_for_signal()).await
}

/// Bind the configured address and run until `signal` resolves.
pub async fn serve<F>(state: AppState, signal: F) -> Result<StopReason, StartupError>
where
    F: Future<Output = ShutdownSignal> + Send,
{
    let address = state.config.listener.bind_address();
    state.logger.info(
        "starting_application",
        Fields::new()
            .with("version", &state.config.service.version)
            .with("port", state.config.listener.port),
    );

    let listener = match TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(source) => {
            state.logger.error(
                "server_error",
                Fields::new()
                    .with("error", source.to_string())
                    .with("address", &address),
            );
            return Err(StartupError::Bind { address, source });
        }
    };

    HttpServer::new(state)
        .run(listener, signal)
        .await
        .map_err(StartupError::Serve)
}
