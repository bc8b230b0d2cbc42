//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers, graceful shutdown)
//!     → middleware/instrumentation.rs (start: timer, gauge, log)
//!     → response.rs (panic boundary)
//!     → handlers/ (health, metrics, data, logs, not found)
//!     → middleware/instrumentation.rs (finish: metrics, log)
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{InFlightRequest, RequestContext};
pub use response::{AppError, ErrorBody};
pub use server::{api_routes, build_router, instrument, AppState, HttpServer};
