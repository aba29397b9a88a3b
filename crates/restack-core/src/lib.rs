//! # restack-core
//!
//! Core library for the restack recovery tool providing:
//! - The error taxonomy shared by every restore phase
//! - Configuration file loading (restack.yaml) with environment overrides
//! - Retry execution engine with policy-based configuration
//! - The readiness gate: bounded polling of probes against a pluggable clock

pub mod config;
pub mod error;
pub mod readiness;
pub mod retry;
pub mod types;

pub use config::RestackConfig;
pub use error::{Error, Result};
pub use readiness::{Clock, ManualClock, Probe, ProbeSignal, ReadinessGate, Readiness, TokioClock};
pub use types::{RetryPolicy, RetryStrategy};
