//! Simulated business operation.
//!
//! Sleeps for a random delay, then fails with the configured probability.
//! The request stays counted in `active_requests` while it sleeps.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::response::error_response;
use crate::http::server::AppState;
use crate::observability::logging::now_rfc3339;
use crate::observability::Fields;

pub const OPERATION: &str = "data_fetch";
pub const FAILURE_MESSAGE: &str = "data processing failed";

/// Record returned on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRecord {
    pub id: u32,
    pub timestamp: String,
    pub value: f64,
    pub status: String,
    pub processing_time_ms: f64,
}

pub async fn fetch_data(State(state): State<AppState>) -> Response {
    let simulation = &state.config.simulation;
    let delay = simulation.delay_for(state.random.unit());
    tokio::time::sleep(delay).await;
    let processing_time_ms = delay.as_secs_f64() * 1000.0;

    if !simulation.succeeds(state.random.unit()) {
        state.metrics.business_operation(OPERATION, "failure");
        state.logger.error(
            "data_fetch_failed",
            Fields::new().with("reason", "simulated_error"),
        );
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, FAILURE_MESSAGE);
    }

    state.metrics.business_operation(OPERATION, "success");

    let record = DataRecord {
        id: ((state.random.unit() * 10_000.0) as u32).min(9_999),
        timestamp: now_rfc3339(),
        value: state.random.unit() * 100.0,
        status: "processed".to_string(),
        processing_time_ms,
    };

    state.logger.info(
        "data_processed",
        Fields::new()
            .with("record_id", record.id)
            .with("processing_ms", processing_time_ms),
    );

    Json(record).into_response()
}
