//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, probabilities in [0, 1])
//! - Check that level names parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use crate::config::schema::AppConfig;
use crate::observability::logging::LogLevel;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.host must not be empty")]
    EmptyHost,

    #[error("service.name must not be empty")]
    EmptyServiceName,

    #[error("shutdown.drain_timeout_secs must be greater than zero")]
    ZeroDrainTimeout,

    #[error("logging.level '{0}' is not one of debug, info, warn, error")]
    UnknownLogLevel(String),

    #[error("simulation.min_delay_ms ({min}) exceeds simulation.max_delay_ms ({max})")]
    InvertedDelayRange { min: u64, max: u64 },

    #[error("simulation.failure_rate {0} is outside [0, 1]")]
    FailureRateOutOfRange(f64),
}

/// Check every semantic constraint and report all violations together.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    }
    if config.service.name.trim().is_empty() {
        errors.push(ValidationError::EmptyServiceName);
    }
    if config.shutdown.drain_timeout_secs == 0 {
        errors.push(ValidationError::ZeroDrainTimeout);
    }
    if LogLevel::parse(&config.logging.level).is_none() {
        errors.push(ValidationError::UnknownLogLevel(config.logging.level.clone()));
    }

    let sim = &config.simulation;
    if sim.min_delay_ms > sim.max_delay_ms {
        errors.push(ValidationError::InvertedDelayRange {
            min: sim.min_delay_ms,
            max: sim.max_delay_ms,
        });
    }
    if !(0.0..=1.0).contains(&sim.failure_rate) {
        errors.push(ValidationError::FailureRateOutOfRange(sim.failure_rate));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
