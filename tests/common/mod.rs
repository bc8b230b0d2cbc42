//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use instrumented_service::config::AppConfig;
use instrumented_service::http::{AppState, HttpServer};
use instrumented_service::lifecycle::{LifecycleState, ShutdownSignal, StopReason};
use instrumented_service::observability::{LogLevel, Logger, MemorySink, Metrics};
use instrumented_service::random::RandomSource;
use service_sdk::ServiceClient;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

/// Config with no artificial delay unless a test asks for one.
pub fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.service.name = "integration-test".into();
    config.listener.host = "127.0.0.1".into();
    config.listener.port = 0;
    config.simulation.min_delay_ms = 0;
    config.simulation.max_delay_ms = 0;
    config
}

/// A live server on an ephemeral port, with its log records captured.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub sink: MemorySink,
    pub lifecycle: watch::Receiver<LifecycleState>,
    signal: Option<oneshot::Sender<ShutdownSignal>>,
    handle: JoinHandle<io::Result<StopReason>>,
}

impl TestServer {
    pub async fn start<R: RandomSource>(config: AppConfig, random: R) -> Self {
        Self::start_with_drain_timeout(config, random, None).await
    }

    pub async fn start_with_drain_timeout<R: RandomSource>(
        config: AppConfig,
        random: R,
        drain_timeout: Option<Duration>,
    ) -> Self {
        let sink = MemorySink::new();
        let logger = Logger::with_writer(config.service.name.clone(), LogLevel::Debug, sink.clone());
        let bind_address = config.listener.bind_address();
        let state = AppState::new(config, logger, Metrics::new().unwrap(), Arc::new(random));

        let listener = TcpListener::bind(bind_address).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut server = HttpServer::new(state.clone());
        if let Some(timeout) = drain_timeout {
            server = server.with_drain_timeout(timeout);
        }
        let lifecycle = server.lifecycle();

        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            server
                .run(listener, async move { rx.await.unwrap_or(ShutdownSignal::Interrupt) })
                .await
        });

        Self {
            addr,
            state,
            sink,
            lifecycle,
            signal: Some(tx),
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn client(&self) -> ServiceClient {
        let http = reqwest::Client::builder().no_proxy().build().unwrap();
        ServiceClient::with_client(http, &self.url())
    }

    /// Deliver `signal` and wait for the server to stop.
    pub async fn stop(mut self, signal: ShutdownSignal) -> StopReason {
        self.signal_only(signal);
        self.handle.await.unwrap().unwrap()
    }

    /// Deliver `signal` without waiting.
    pub fn signal_only(&mut self, signal: ShutdownSignal) {
        if let Some(tx) = self.signal.take() {
            let _ = tx.send(signal);
        }
    }

    pub async fn join(self) -> StopReason {
        self.handle.await.unwrap().unwrap()
    }
}

/// Wait until the lifecycle reaches `target`.
pub async fn wait_for_state(lifecycle: &mut watch::Receiver<LifecycleState>, target: LifecycleState) {
    tokio::time::timeout(Duration::from_secs(5), lifecycle.wait_for(|state| *state == target))
        .await
        .expect("lifecycle state not reached in time")
        .expect("lifecycle channel closed");
}
