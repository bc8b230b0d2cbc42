//! Instrumented HTTP Service Library
//!
//! A small HTTP service whose every request is measured: one structured log
//! record and one metrics update per request, whatever the outcome.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod random;

pub use config::AppConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::{Shutdown, ShutdownSignal, StopReason};
