//! Internal diagnostics.
//!
//! Library and framework events (config loading, request spans from
//! tower-http, signal installation problems) go through `tracing` to stderr,
//! keeping stdout for the structured record stream.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global diagnostics subscriber.
///
/// `RUST_LOG` wins over `default_directive`. Returns `false` if a subscriber
/// was already installed.
pub fn init_diagnostics(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .is_ok()
}
