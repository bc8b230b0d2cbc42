//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build logger + metrics → Bind → Serve
//!
//! Shutdown (shutdown.rs, driven by http::server):
//!     Signal received → Stop accepting → Drain in-flight requests → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM → drain with deadline (exit 1 when it passes)
//!     SIGINT  → drain without deadline
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then observability, then listener
//! - Ordered shutdown: stop accept, drain, close
//! - State transitions are published on a watch channel (state.rs)

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;

pub use shutdown::{Shutdown, ShutdownSignal, StopReason};
pub use state::{Lifecycle, LifecycleState};
