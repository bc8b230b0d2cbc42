//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Own the service's Prometheus recorder and its instruments
//! - Record per-request and per-operation measurements
//! - Render the registry in the Prometheus text format
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, path, status
//! - `http_request_duration_seconds` (histogram): latency by method, path
//! - `active_requests` (gauge): requests currently in flight
//! - `business_operations_total` (counter): domain outcomes by operation, status
//! - `process_*`: CPU, memory, file descriptors, threads and start time of
//!   this process, refreshed on every render
//!
//! # Design Decisions
//! - The recorder is never installed globally; each update runs under
//!   `metrics::with_local_recorder`, so every `Metrics` value is isolated
//! - Latency is a real histogram with the Prometheus default buckets
//! - The in-flight count is an atomic that refuses to drop below zero; the
//!   gauge is only decremented when that atomic was decremented

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use metrics_process::Collector;

pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const ACTIVE_REQUESTS: &str = "active_requests";
pub const BUSINESS_OPERATIONS_TOTAL: &str = "business_operations_total";

/// Media type of the Prometheus text exposition format.
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Prometheus client default buckets.
pub const DEFAULT_BUCKETS: [f64; 11] = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("failed to build Prometheus recorder: {0}")]
    Build(#[from] BuildError),
}

/// Process-wide metrics registry.
///
/// Clones share the same underlying instruments.
#[derive(Clone)]
pub struct Metrics {
    recorder: Arc<PrometheusRecorder>,
    handle: PrometheusHandle,
    process: Collector,
    in_flight: Arc<AtomicU64>,
}

impl Metrics {
    /// Build the recorder and register all instruments.
    pub fn new() -> Result<Self, MetricsError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full(HTTP_REQUEST_DURATION_SECONDS.to_string()),
                &DEFAULT_BUCKETS,
            )?
            .build_recorder();
        let handle = recorder.handle();

        let metrics = Self {
            recorder: Arc::new(recorder),
            handle,
            process: Collector::default(),
            in_flight: Arc::new(AtomicU64::new(0)),
        };
        metrics.describe();
        Ok(metrics)
    }

    fn describe(&self) {
        self.scoped(|| {
            describe_counter!(HTTP_REQUESTS_TOTAL, "Total number of HTTP requests");
            describe_histogram!(
                HTTP_REQUEST_DURATION_SECONDS,
                Unit::Seconds,
                "HTTP request duration in seconds"
            );
            describe_gauge!(ACTIVE_REQUESTS, "Number of active requests");
            describe_counter!(BUSINESS_OPERATIONS_TOTAL, "Total business operations");
            gauge!(ACTIVE_REQUESTS).set(0.0);
            self.process.describe();
        });
    }

    fn scoped<T>(&self, f: impl FnOnce() -> T) -> T {
        metrics::with_local_recorder(self.recorder.as_ref(), f)
    }

    /// A request entered the service.
    pub fn request_started(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.scoped(|| gauge!(ACTIVE_REQUESTS).increment(1.0));
    }

    /// A request left the service.
    pub fn request_finished(&self, method: &str, path: &str, status: u16, elapsed: Duration) {
        let was_in_flight = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        self.scoped(|| {
            counter!(
                HTTP_REQUESTS_TOTAL,
                "method" => method.to_string(),
                "path" => path.to_string(),
                "status" => status.to_string()
            )
            .increment(1);
            histogram!(
                HTTP_REQUEST_DURATION_SECONDS,
                "method" => method.to_string(),
                "path" => path.to_string()
            )
            .record(elapsed.as_secs_f64());
            if was_in_flight {
                gauge!(ACTIVE_REQUESTS).decrement(1.0);
            }
        });
    }

    /// Count a domain-level outcome.
    pub fn business_operation(&self, operation: &'static str, status: &'static str) {
        self.scoped(|| {
            counter!(
                BUSINESS_OPERATIONS_TOTAL,
                "operation" => operation,
                "status" => status
            )
            .increment(1);
        });
    }

    /// Requests currently in flight.
    pub fn active_requests(&self) -> u64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Render every instrument in the Prometheus text format.
    pub fn render(&self) -> String {
        self.scoped(|| self.process.collect());
        self.handle.render()
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("active_requests", &self.active_requests())
            .finish_non_exhaustive()
    }
}

/// Look up a sample in rendered exposition text.
///
/// Matches the line for `name` whose label set contains every pair in
/// `labels` and returns its value.
pub fn sample_value(rendered: &str, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
    rendered
        .lines()
        .filter(|line| !line.starts_with('#'))
        .find(|line| {
            let Some(rest) = line.strip_prefix(name) else {
                return false;
            };
            if !(rest.starts_with('{') || rest.starts_with(' ')) {
                return false;
            }
            labels
                .iter()
                .all(|(key, value)| rest.contains(&format!("{key}=\"{value}\"")))
        })
        .and_then(|line| line.rsplit(' ').next())
        .and_then(|value| value.parse().ok())
}
