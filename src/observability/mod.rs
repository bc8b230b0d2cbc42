//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request middleware and handlers produce:
//!     → logging.rs (structured JSON records on stdout)
//!     → metrics.rs (counters, gauge, histogram)
//!
//! Framework internals produce:
//!     → diagnostics.rs (tracing events on stderr)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → GET /metrics (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Logger and registry are explicit values, constructed once at startup
//! - Metric updates are cheap (atomic operations behind the recorder)

pub mod diagnostics;
pub mod logging;
pub mod metrics;

pub use logging::{Fields, LogLevel, Logger, MemorySink};
pub use metrics::{Metrics, MetricsError};
