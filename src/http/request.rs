//! Per-request context and in-flight tracking.
//!
//! # Responsibilities
//! - Capture method, path, remote address and start time on entry
//! - Count the request as in flight for exactly as long as it is alive
//! - Record completion metrics and the `request_completed` record once
//!
//! # Design Decisions
//! - Completion runs in `Drop`, so it happens on every exit path: normal
//!   return, error response, panic unwinding, or the future being dropped
//! - A request that never reported a status is recorded as 500

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request};
use axum::http::{Method, StatusCode};

use crate::observability::{Fields, Logger, Metrics};

/// Facts about a request known before the handler runs.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub started: Instant,
    pub method: Method,
    pub path: String,
    pub remote_addr: Option<SocketAddr>,
}

impl RequestContext {
    pub fn from_request(request: &Request) -> Self {
        Self {
            started: Instant::now(),
            method: request.method().clone(),
            path: request.uri().path().to_string(),
            remote_addr: request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Guard for one in-flight request.
///
/// Creating it logs `incoming_request` and bumps `active_requests`; dropping
/// it records the outcome.
#[derive(Debug)]
pub struct InFlightRequest {
    context: RequestContext,
    metrics: Metrics,
    logger: Logger,
    status: Option<StatusCode>,
}

impl InFlightRequest {
    pub fn begin(context: RequestContext, metrics: Metrics, logger: Logger) -> Self {
        logger.info(
            "incoming_request",
            Fields::new()
                .with("method", context.method.as_str())
                .with("path", &context.path)
                .with("remote_addr", context.remote_addr.map(|addr| addr.to_string())),
        );
        metrics.request_started();

        Self {
            context,
            metrics,
            logger,
            status: None,
        }
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Finish with the status actually sent to the client.
    pub fn complete(mut self, status: StatusCode) {
        self.status = Some(status);
    }
}

impl Drop for InFlightRequest {
    fn drop(&mut self) {
        let status = self.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let elapsed = self.context.elapsed();
        let method = self.context.method.as_str();

        self.metrics
            .request_finished(method, &self.context.path, status.as_u16(), elapsed);

        self.logger.info(
            "request_completed",
            Fields::new()
                .with("method", method)
                .with("path", &self.context.path)
                .with("status", status.as_u16())
                .with("duration_ms", elapsed.as_secs_f64() * 1000.0),
        );
    }
}
