//! Instrumented HTTP Service
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ trace layer ──▶ instrumentation ──▶ panic boundary ──▶ handler
//!                                      │ start: T0,                          │
//!                                      │ active_requests += 1,               │
//!                                      │ incoming_request                    │
//!                                      ▼                                     │
//!     Client Response                  finish (guard drop):  ◀───────────────┘
//!     ◀────────────────────────────── http_requests_total, duration histogram,
//!                                      active_requests -= 1, request_completed
//!
//!     stdout: JSON records         stderr: tracing diagnostics      GET /metrics
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use instrumented_service::lifecycle::startup;
use instrumented_service::observability::{Fields, LogLevel, Logger};

#[derive(Parser)]
#[command(name = "instrumented-service")]
#[command(version, about = "HTTP service with structured logging and Prometheus metrics", long_about = None)]
struct Cli {
    /// Optional TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match startup::launch(cli.config.as_deref()).await {
        Ok(reason) => reason.exit_code(),
        Err(e) => {
            Logger::stdout(env!("CARGO_PKG_NAME"), LogLevel::Debug)
                .error("startup_failed", Fields::new().with("error", e.to_string()));
            ExitCode::FAILURE
        }
    }
}
