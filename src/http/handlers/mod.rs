//! Endpoint handlers.
//!
//! # Routes
//! - `GET /` → health.rs
//! - `GET /metrics` → metrics.rs
//! - `GET /api/data` → data.rs (simulated business operation)
//! - `POST /api/logs` → logs.rs (log trigger)
//! - anything else → [`not_found`]

pub mod data;
pub mod health;
pub mod logs;
pub mod metrics;

use axum::http::StatusCode;
use axum::response::Response;

use crate::http::response::{error_response, NOT_FOUND};

pub use data::fetch_data;
pub use health::health;
pub use logs::trigger_log;
pub use metrics::export_metrics;

/// Fallback for unmatched paths and unsupported methods.
pub async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, NOT_FOUND)
}
