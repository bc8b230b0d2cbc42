//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (tracing, instrumentation, panic boundary)
//! - Bind server to listener with connection info
//! - Drive the lifecycle: listen, drain on signal, stop

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::http::handlers::{export_metrics, fetch_data, health, not_found, trigger_log};
use crate::http::middleware::instrument_requests;
use crate::http::response::{install_panic_hook, panic_response};
use crate::lifecycle::{Lifecycle, LifecycleState, Shutdown, ShutdownSignal, StopReason};
use crate::observability::{Fields, Logger, Metrics};
use crate::random::RandomSource;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub logger: Logger,
    pub metrics: Metrics,
    pub random: Arc<dyn RandomSource>,
}

impl AppState {
    pub fn new(config: AppConfig, logger: Logger, metrics: Metrics, random: Arc<dyn RandomSource>) -> Self {
        Self {
            config: Arc::new(config),
            logger,
            metrics,
            random,
        }
    }
}

/// The service's own routes, without middleware.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(health))
        .route("/metrics", get(export_metrics))
        .route("/api/data", get(fetch_data))
        .route("/api/logs", post(trigger_log))
}

/// Add the fallbacks and middleware stack to `routes`.
///
/// Layer order, outermost first: trace → instrumentation → panic boundary.
/// The panic boundary sits inside instrumentation so a panicking handler is
/// recorded with the 500 the client receives.
pub fn instrument(routes: Router<AppState>, state: AppState) -> Router {
    install_panic_hook();
    routes
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn_with_state(state.clone(), instrument_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Fully assembled application router.
pub fn build_router(state: AppState) -> Router {
    instrument(api_routes(), state)
}

/// HTTP server for the service.
pub struct HttpServer {
    router: Router,
    logger: Logger,
    drain_timeout: Duration,
    lifecycle: Lifecycle,
}

impl HttpServer {
    /// Create a new HTTP server from application state.
    pub fn new(state: AppState) -> Self {
        Self::with_router(build_router(state.clone()), &state)
    }

    /// Serve a custom router (e.g. [`instrument`]ed extra routes).
    pub fn with_router(router: Router, state: &AppState) -> Self {
        Self {
            router,
            logger: state.logger.clone(),
            drain_timeout: state.config.shutdown.drain_timeout(),
            lifecycle: Lifecycle::new(),
        }
    }

    /// Override the drain deadline applied after a terminate signal.
    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    /// Watch lifecycle transitions.
    pub fn lifecycle(&self) -> watch::Receiver<LifecycleState> {
        self.lifecycle.subscribe()
    }

    /// Run the server until `signal` resolves, then drain.
    ///
    /// On [`ShutdownSignal::Terminate`] draining is bounded by the drain
    /// timeout; on [`ShutdownSignal::Interrupt`] it is not.
    pub async fn run<F>(self, listener: TcpListener, signal: F) -> Result<StopReason, io::Error>
    where
        F: Future<Output = ShutdownSignal> + Send,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let shutdown = Shutdown::new();
        let mut stop_accepting = shutdown.subscribe();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = stop_accepting.recv().await;
        });
        let mut serving = tokio::spawn(async move { serve.await });

        self.lifecycle.set(LifecycleState::Listening);
        self.logger.info(
            "server_listening",
            Fields::new()
                .with("port", addr.port())
                .with("address", addr.ip().to_string()),
        );

        let received = tokio::select! {
            joined = &mut serving => {
                // The server ended on its own; nothing left to drain.
                self.lifecycle.set(LifecycleState::Stopped);
                joined.map_err(io::Error::other)??;
                return Ok(StopReason::Stopped);
            }
            received = signal => received,
        };

        self.logger
            .info("shutting_down_server", Fields::new().with("signal", received.as_str()));
        self.lifecycle.set(LifecycleState::Draining);
        shutdown.trigger();

        let joined = match received {
            ShutdownSignal::Terminate => match tokio::time::timeout(self.drain_timeout, &mut serving).await {
                Ok(joined) => joined,
                Err(_) => {
                    self.logger.error(
                        "server_shutdown_timeout",
                        Fields::new().with("timeout_secs", self.drain_timeout.as_secs_f64()),
                    );
                    serving.abort();
                    self.lifecycle.set(LifecycleState::Stopped);
                    return Ok(StopReason::DrainTimedOut);
                }
            },
            ShutdownSignal::Interrupt => serving.await,
        };

        self.lifecycle.set(LifecycleState::Stopped);
        joined.map_err(io::Error::other)??;
        self.logger.info("server_stopped", Fields::new());
        tracing::info!("HTTP server stopped");
        Ok(StopReason::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::metrics::{
        sample_value, ACTIVE_REQUESTS, BUSINESS_OPERATIONS_TOTAL, HTTP_REQUESTS_TOTAL,
        HTTP_REQUEST_DURATION_SECONDS,
    };
    use crate::observability::{LogLevel, MemorySink};
    use crate::http::response::AppError;
    use crate::random::{ScriptedRandom, SeededRandom};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct Harness {
        state: AppState,
        sink: MemorySink,
    }

    impl Harness {
        fn new(random: impl RandomSource) -> Self {
            let mut config = AppConfig::default();
            config.service.name = "router-test".into();
            config.simulation.min_delay_ms = 0;
            config.simulation.max_delay_ms = 0;
            let sink = MemorySink::new();
            let logger = Logger::with_writer("router-test", LogLevel::Debug, sink.clone());
            let state = AppState::new(config, logger, Metrics::new().unwrap(), Arc::new(random));
            Self { state, sink }
        }

        async fn call(&self, router: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
            let response = router.oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            (status, bytes.to_vec())
        }

        async fn get(&self, path: &str) -> (StatusCode, Value) {
            let request = Request::get(path).body(Body::empty()).unwrap();
            let (status, bytes) = self.call(build_router(self.state.clone()), request).await;
            (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
        }

        async fn post_logs(&self, body: &str) -> (StatusCode, Value) {
            let request = Request::post("/api/logs")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap();
            let (status, bytes) = self.call(build_router(self.state.clone()), request).await;
            (status, serde_json::from_slice(&bytes).unwrap())
        }

        fn sample(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
            sample_value(&self.state.metrics.render(), name, labels)
        }
    }

    #[tokio::test]
    async fn health_reports_service_identity() {
        let harness = Harness::new(ScriptedRandom::constant(0.5));
        let (status, body) = harness.get("/").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "router-test");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn every_request_is_counted_and_logged() {
        let harness = Harness::new(ScriptedRandom::constant(0.5));
        harness.get("/").await;
        harness.get("/").await;

        assert_eq!(
            harness.sample(
                HTTP_REQUESTS_TOTAL,
                &[("method", "GET"), ("path", "/"), ("status", "200")]
            ),
            Some(2.0)
        );
        assert_eq!(
            harness.sample(
                "http_request_duration_seconds_count",
                &[("method", "GET"), ("path", "/")]
            ),
            Some(2.0)
        );
        assert_eq!(harness.state.metrics.active_requests(), 0);
        assert_eq!(harness.sink.records_with_message("incoming_request").len(), 2);

        let completed = harness.sink.records_with_message("request_completed");
        assert_eq!(completed.len(), 2);
        assert_eq!(completed[0]["method"], "GET");
        assert_eq!(completed[0]["path"], "/");
        assert_eq!(completed[0]["status"], 200);
    }

    #[tokio::test]
    async fn unknown_path_is_404_without_error_log() {
        let harness = Harness::new(ScriptedRandom::constant(0.5));
        let (status, body) = harness.get("/unknown-path").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "not found"}));
        assert!(harness.sink.records().iter().all(|r| r["level"] != "ERROR"));
        assert_eq!(
            harness.sample(
                HTTP_REQUESTS_TOTAL,
                &[("path", "/unknown-path"), ("status", "404")]
            ),
            Some(1.0)
        );
    }

    #[tokio::test]
    async fn wrong_method_is_404() {
        let harness = Harness::new(ScriptedRandom::constant(0.5));
        let (status, body) = harness.get("/api/logs").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not found");
    }

    #[tokio::test]
    async fn data_success_branch() {
        // delay, outcome, id, value
        let harness = Harness::new(ScriptedRandom::new([0.0, 0.5, 0.5, 0.25], 0.5));
        let (status, body) = harness.get("/api/data").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 5000);
        assert_eq!(body["value"], 25.0);
        assert_eq!(body["status"], "processed");
        assert!(body["processing_time_ms"].is_number());
        assert!(body["timestamp"].is_string());

        assert_eq!(
            harness.sample(
                BUSINESS_OPERATIONS_TOTAL,
                &[("operation", "data_fetch"), ("status", "success")]
            ),
            Some(1.0)
        );
        let processed = harness.sink.records_with_message("data_processed");
        assert_eq!(processed.len(), 1);
        assert_eq!(processed[0]["record_id"], 5000);
    }

    #[tokio::test]
    async fn data_failure_branch() {
        let harness = Harness::new(ScriptedRandom::new([0.0, 0.05], 0.5));
        let (status, body) = harness.get("/api/data").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "data processing failed"}));
        assert_eq!(
            harness.sample(
                BUSINESS_OPERATIONS_TOTAL,
                &[("operation", "data_fetch"), ("status", "failure")]
            ),
            Some(1.0)
        );

        let failed = harness.sink.records_with_message("data_fetch_failed");
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0]["level"], "ERROR");
        assert_eq!(failed[0]["reason"], "simulated_error");
        // A simulated failure is not an unhandled fault.
        assert!(harness.sink.records_with_message("internal_server_error").is_empty());
        assert_eq!(
            harness.sample(
                HTTP_REQUESTS_TOTAL,
                &[("path", "/api/data"), ("status", "500")]
            ),
            Some(1.0)
        );
    }

    #[tokio::test]
    async fn data_failure_rate_converges() {
        let harness = Harness::new(SeededRandom::new(2024));
        let calls = 1_000;
        let mut failures = 0;
        for _ in 0..calls {
            let (status, body) = harness.get("/api/data").await;
            match status {
                StatusCode::OK => {
                    let id = body["id"].as_u64().unwrap();
                    let value = body["value"].as_f64().unwrap();
                    assert!(id < 10_000);
                    assert!((0.0..100.0).contains(&value));
                    assert_eq!(body["status"], "processed");
                }
                StatusCode::INTERNAL_SERVER_ERROR => {
                    assert_eq!(body, json!({"error": "data processing failed"}));
                    failures += 1;
                }
                other => panic!("unexpected status {other}"),
            }
        }
        let rate = failures as f64 / calls as f64;
        assert!((0.06..=0.14).contains(&rate), "failure rate {rate}");
    }

    #[tokio::test]
    async fn error_log_trigger_counts_twice() {
        let harness = Harness::new(ScriptedRandom::constant(0.5));
        let (status, body) = harness.post_logs(r#"{"level": "error", "message": "x"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "logged", "level": "error"}));
        assert_eq!(
            harness.sample(
                BUSINESS_OPERATIONS_TOTAL,
                &[("operation", "log_trigger"), ("status", "error")]
            ),
            Some(1.0)
        );
        assert_eq!(
            harness.sample(
                BUSINESS_OPERATIONS_TOTAL,
                &[("operation", "log_trigger"), ("status", "success")]
            ),
            Some(1.0)
        );

        let lines = harness.sink.records_with_message("x");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["level"], "ERROR");
    }

    #[tokio::test]
    async fn log_trigger_levels() {
        let harness = Harness::new(ScriptedRandom::constant(0.5));
        harness
            .post_logs(r#"{"level": "WARNING", "message": "w", "fields": {"user": 7}}"#)
            .await;
        harness.post_logs(r#"{"level": "Debug", "message": "d"}"#).await;
        let (_, body) = harness.post_logs(r#"{"level": "loud", "message": "l"}"#).await;

        assert_eq!(body["level"], "loud");
        let warn = &harness.sink.records_with_message("w")[0];
        assert_eq!(warn["level"], "WARN");
        assert_eq!(warn["user"], 7);
        assert_eq!(harness.sink.records_with_message("d")[0]["level"], "DEBUG");
        assert_eq!(harness.sink.records_with_message("l")[0]["level"], "INFO");

        assert_eq!(
            harness.sample(
                BUSINESS_OPERATIONS_TOTAL,
                &[("operation", "log_trigger"), ("status", "warning")]
            ),
            Some(1.0)
        );
        assert_eq!(
            harness.sample(
                BUSINESS_OPERATIONS_TOTAL,
                &[("operation", "log_trigger"), ("status", "success")]
            ),
            Some(3.0)
        );
    }

    #[tokio::test]
    async fn log_trigger_defaults() {
        let harness = Harness::new(ScriptedRandom::constant(0.5));
        let (status, body) = harness.post_logs("{}").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["level"], "info");
        assert_eq!(harness.sink.records_with_message("test_message")[0]["level"], "INFO");
    }

    #[tokio::test]
    async fn malformed_log_body_is_400() {
        let harness = Harness::new(ScriptedRandom::constant(0.5));
        let (status, body) = harness.post_logs("{oops").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "invalid request body"}));
        assert_eq!(harness.sink.records_with_message("invalid_request").len(), 1);
        assert_eq!(
            harness.sample(
                BUSINESS_OPERATIONS_TOTAL,
                &[("operation", "log_trigger"), ("status", "success")]
            ),
            None
        );
    }

    #[tokio::test]
    async fn metrics_endpoint_lists_all_instruments() {
        let harness = Harness::new(ScriptedRandom::constant(0.5));
        harness.get("/api/data").await;

        let request = Request::get("/metrics").body(Body::empty()).unwrap();
        let response = build_router(harness.state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4; charset=utf-8"
        );

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        for name in [
            HTTP_REQUESTS_TOTAL,
            HTTP_REQUEST_DURATION_SECONDS,
            ACTIVE_REQUESTS,
            BUSINESS_OPERATIONS_TOTAL,
        ] {
            assert!(text.contains(name), "missing {name}");
        }
        assert!(text.contains("# TYPE process_"), "missing process metrics");
        // The scrape itself is still in flight while rendering.
        assert_eq!(sample_value(&text, ACTIVE_REQUESTS, &[]), Some(1.0));
    }

    #[tokio::test]
    async fn handler_error_is_logged_once_and_counted() {
        let harness = Harness::new(ScriptedRandom::constant(0.5));
        let routes = api_routes().route(
            "/fails",
            get(|| async { Err::<(), AppError>(AppError::internal("backend unavailable")) }),
        );
        let request = Request::get("/fails").body(Body::empty()).unwrap();
        let (status, bytes) = harness
            .call(instrument(routes, harness.state.clone()), request)
            .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            serde_json::from_slice::<Value>(&bytes).unwrap(),
            json!({"error": "internal server error"})
        );

        let faults = harness.sink.records_with_message("internal_server_error");
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0]["error"], "backend unavailable");
        assert!(faults[0]["trace"].is_string());

        assert_eq!(harness.sink.records_with_message("request_completed").len(), 1);
        assert_eq!(
            harness.sample(HTTP_REQUESTS_TOTAL, &[("path", "/fails"), ("status", "500")]),
            Some(1.0)
        );
        assert_eq!(harness.state.metrics.active_requests(), 0);
    }

    #[tokio::test]
    async fn panicking_handler_does_not_leak_in_flight() {
        let harness = Harness::new(ScriptedRandom::constant(0.5));
        let routes = api_routes().route(
            "/panics",
            get(|| async {
                if true {
                    panic!("handler exploded");
                }
                "unreachable"
            }),
        );
        let request = Request::get("/panics").body(Body::empty()).unwrap();
        let (status, bytes) = harness
            .call(instrument(routes, harness.state.clone()), request)
            .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            serde_json::from_slice::<Value>(&bytes).unwrap()["error"],
            "internal server error"
        );
        assert_eq!(harness.state.metrics.active_requests(), 0);
        assert_eq!(
            harness.sink.records_with_message("internal_server_error")[0]["error"],
            "handler exploded"
        );
        assert_eq!(
            harness.sample(HTTP_REQUESTS_TOTAL, &[("path", "/panics"), ("status", "500")]),
            Some(1.0)
        );
        assert_eq!(harness.sample(ACTIVE_REQUESTS, &[]), Some(0.0));
    }

    #[inline(never)]
    fn apply_discount_rules() -> &'static str {
        panic!("discount table missing");
    }

    #[inline(never)]
    fn load_customer_profile() -> Result<&'static str, AppError> {
        Err(AppError::internal("profile store timed out"))
    }

    #[tokio::test]
    async fn logged_trace_points_at_the_faulting_code() {
        let harness = Harness::new(ScriptedRandom::constant(0.5));
        let routes = api_routes()
            .route("/discount", get(|| async { apply_discount_rules() }))
            .route("/profile", get(|| async { load_customer_profile() }));
        let router = instrument(routes, harness.state.clone());

        for path in ["/discount", "/profile"] {
            let request = Request::get(path).body(Body::empty()).unwrap();
            let (status, _) = harness.call(router.clone(), request).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        }

        let faults = harness.sink.records_with_message("internal_server_error");
        assert_eq!(faults.len(), 2);

        let panic_trace = faults[0]["trace"].as_str().unwrap();
        assert_eq!(faults[0]["error"], "discount table missing");
        assert!(panic_trace.contains("apply_discount_rules"), "{panic_trace}");
        assert!(!panic_trace.contains("panic_response"), "{panic_trace}");

        let error_trace = faults[1]["trace"].as_str().unwrap();
        assert_eq!(faults[1]["error"], "profile store timed out");
        assert!(error_trace.contains("load_customer_profile"), "{error_trace}");
    }
}
