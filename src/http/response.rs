//! Error responses and the catch-all fault boundary.
//!
//! # Responsibilities
//! - Uniform JSON error bodies (`{"error": ...}`) for every failure
//! - Convert handler errors and panics into a generic 500
//! - Attach an [`UnhandledFault`] report so the instrumentation middleware
//!   can log it once
//!
//! # Design Decisions
//! - The boundary never logs by itself; the middleware owns the logger and
//!   emits `internal_server_error` before it finalizes the request
//! - Traces are taken where the fault is raised: [`AppError::internal`]
//!   captures one on construction, and a panic hook records one per thread
//!   before the stack unwinds

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::sync::Once;

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

pub const NOT_FOUND: &str = "not found";
pub const INTERNAL_SERVER_ERROR: &str = "internal server error";
pub const INVALID_REQUEST_BODY: &str = "invalid request body";

/// JSON body of every user-visible failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}

/// `(status, {"error": message})`.
pub fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(ErrorBody::new(message))).into_response()
}

/// Report of a fault caught by the boundary, carried in response extensions.
#[derive(Debug, Clone)]
pub struct UnhandledFault {
    pub message: String,
    pub trace: String,
}

impl UnhandledFault {
    pub fn capture(message: impl Into<String>) -> Self {
        Self::with_trace(message, Backtrace::force_capture().to_string())
    }

    pub fn with_trace(message: impl Into<String>, trace: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trace: trace.into(),
        }
    }

    fn respond(self) -> Response {
        let mut response = error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_SERVER_ERROR);
        response.extensions_mut().insert(self);
        response
    }
}

/// Errors a handler may return instead of a response.
///
/// Handlers with a fallible step return `Result<_, AppError>`; the boundary
/// turns the error into a generic 500 and the middleware logs it. The
/// built-in handlers have no such step, their failures are expected
/// outcomes with their own responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Any fault the handler did not expect.
    #[error("{error}")]
    Internal {
        error: Box<dyn std::error::Error + Send + Sync>,
        /// Stack at the point the error was built.
        trace: String,
    },
}

impl AppError {
    pub fn internal(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::from_error(message)
    }

    pub fn from_error(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Internal {
            error: error.into(),
            trace: Backtrace::force_capture().to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::Internal { error, trace } => UnhandledFault::with_trace(error.to_string(), trace).respond(),
        }
    }
}

thread_local! {
    static PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Record a backtrace for every panic on the panicking thread, then defer to
/// the previously installed hook. Idempotent.
pub fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture().to_string();
            let _ = PANIC_TRACE.try_with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

fn take_panic_trace() -> Option<String> {
    PANIC_TRACE.try_with(|slot| slot.borrow_mut().take()).ok().flatten()
}

/// Response for a panic caught by `tower_http::catch_panic::CatchPanicLayer`.
///
/// The layer catches the panic on the thread that raised it, so the trace
/// recorded by [`install_panic_hook`] is the one for this panic.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let message = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "handler panicked".to_string()
    };
    let trace = take_panic_trace().unwrap_or_else(|| Backtrace::force_capture().to_string());
    UnhandledFault::with_trace(message, trace).respond()
}
