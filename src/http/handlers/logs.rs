//! Log trigger endpoint.
//!
//! Writes one record at the requested level and counts the call under
//! `business_operations_total{operation="log_trigger"}`.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::http::response::{error_response, INVALID_REQUEST_BODY};
use crate::http::server::AppState;
use crate::observability::{Fields, LogLevel};

pub const OPERATION: &str = "log_trigger";

/// Request body. Missing or null members take their defaults.
#[derive(Debug, Default, Deserialize)]
pub struct LogTrigger {
    pub level: Option<String>,
    pub message: Option<String>,
    pub fields: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogTriggered {
    pub status: String,
    pub level: String,
}

pub async fn trigger_log(State(state): State<AppState>, body: Result<Bytes, BytesRejection>) -> Response {
    let trigger = match body.map_err(|e| (e.status(), e.body_text())).and_then(|bytes| parse(&bytes)) {
        Ok(trigger) => trigger,
        Err((status, reason)) => {
            state
                .logger
                .error("invalid_request", Fields::new().with("error", reason));
            return error_response(status, INVALID_REQUEST_BODY);
        }
    };

    let level = trigger.level.unwrap_or_else(|| "info".to_string());
    let message = trigger.message.unwrap_or_else(|| "test_message".to_string());
    let fields = Fields::from(trigger.fields.unwrap_or_default());

    match LogLevel::parse(&level) {
        Some(LogLevel::Error) => {
            state.logger.error(&message, fields);
            state.metrics.business_operation(OPERATION, "error");
        }
        Some(LogLevel::Warn) => {
            state.logger.warn(&message, fields);
            state.metrics.business_operation(OPERATION, "warning");
        }
        Some(LogLevel::Debug) => state.logger.debug(&message, fields),
        Some(LogLevel::Info) | None => state.logger.info(&message, fields),
    }

    // Counted for every level, including error and warn.
    state.metrics.business_operation(OPERATION, "success");

    Json(LogTriggered {
        status: "logged".to_string(),
        level,
    })
    .into_response()
}

fn parse(bytes: &[u8]) -> Result<LogTrigger, (StatusCode, String)> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(LogTrigger::default());
    }
    serde_json::from_slice(bytes).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))
}
