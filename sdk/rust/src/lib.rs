//! Client SDK for the instrumented service.

pub mod client;

pub use client::{ClientError, DataOutcome, ServiceClient};
