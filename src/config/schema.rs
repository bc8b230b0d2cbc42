//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind host and port).
    pub listener: ListenerConfig,

    /// Identity reported in log records and the health endpoint.
    pub service: ServiceConfig,

    /// Graceful shutdown settings.
    pub shutdown: ShutdownConfig,

    /// Structured log and diagnostic output settings.
    pub logging: LoggingConfig,

    /// Behavior of the simulated business operation.
    pub simulation: SimulationConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// TCP port. Port 0 asks the OS for an ephemeral port.
    pub port: u16,
}

impl ListenerConfig {
    /// The `host:port` string handed to the TCP listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Service identity.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Value of the `service` field on every log record.
    pub name: String,

    /// Version reported by the health endpoint.
    pub version: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Maximum time to wait for in-flight requests after SIGTERM.
    pub drain_timeout_secs: u64,
}

impl ShutdownConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 30,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level of structured records written to stdout
    /// (debug, info, warn, error).
    pub level: String,

    /// Default `EnvFilter` directive for internal diagnostics on stderr,
    /// used when `RUST_LOG` is not set.
    pub diagnostics: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "debug".to_string(),
            diagnostics: "instrumented_service=info,tower_http=warn".to_string(),
        }
    }
}

/// Simulated business operation settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Lower bound (inclusive) of the artificial delay.
    pub min_delay_ms: u64,

    /// Upper bound (exclusive) of the artificial delay.
    pub max_delay_ms: u64,

    /// Probability that a call fails, in [0, 1].
    pub failure_rate: f64,
}

impl SimulationConfig {
    /// Map a uniform draw in [0, 1) onto the configured delay range.
    pub fn delay_for(&self, roll: f64) -> Duration {
        let span = self.max_delay_ms.saturating_sub(self.min_delay_ms) as f64;
        let millis = self.min_delay_ms as f64 + span * roll.clamp(0.0, 1.0);
        Duration::from_secs_f64(millis / 1000.0)
    }

    /// A call succeeds unless the roll lands below the failure rate.
    pub fn succeeds(&self, roll: f64) -> bool {
        roll >= self.failure_rate
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 50,
            max_delay_ms: 150,
            failure_rate: 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_contract() {
        let config = AppConfig::default();
        assert_eq!(config.listener.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.shutdown.drain_timeout(), Duration::from_secs(30));
        assert_eq!(config.simulation.failure_rate, 0.1);
        assert_eq!(config.service.name, "instrumented-service");
    }

    #[test]
    fn delay_spans_configured_range() {
        let sim = SimulationConfig::default();
        assert_eq!(sim.delay_for(0.0), Duration::from_millis(50));
        assert_eq!(sim.delay_for(0.5), Duration::from_millis(100));
        assert!(sim.delay_for(0.999_999) < Duration::from_millis(150));
    }

    #[test]
    fn failure_threshold() {
        let sim = SimulationConfig::default();
        assert!(!sim.succeeds(0.0));
        assert!(!sim.succeeds(0.099));
        assert!(sim.succeeds(0.1));
        assert!(sim.succeeds(0.95));

        let never_fails = SimulationConfig {
            failure_rate: 0.0,
            ..SimulationConfig::default()
        };
        assert!(never_fails.succeeds(0.0));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [listener]
            port = 9000

            [simulation]
            failure_rate = 0.25
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.port, 9000);
        assert_eq!(config.listener.host, "0.0.0.0");
        assert_eq!(config.simulation.failure_rate, 0.25);
        assert_eq!(config.simulation.min_delay_ms, 50);
    }
}
