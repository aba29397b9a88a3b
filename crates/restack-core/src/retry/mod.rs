//! Retry execution engine with policy-based configuration
//!
//! Wraps unreliable remote operations (management-UI calls, platform API
//! calls, archive probes) with bounded attempts and exponential delay. The
//! core restore operations are not wrapped here; they are retried at the
//! phase level instead.
//!
//! # Example
//!
//! ```rust,no_run
//! use restack_core::retry::{retry, RetryError};
//! use std::time::Duration;
//!
//! async fn example() -> Result<String, RetryError<std::io::Error>> {
//!     retry(|| async { Ok("token".to_string()) }, 3, Duration::from_secs(2)).await
//! }
//! ```

mod error;
mod executor;
mod observer;
mod strategies;

pub use error::RetryError;
pub use executor::{retry, retry_with_policy, RetryExecutor, RetryExecutorBuilder};
pub use observer::{NoOpObserver, RetryObserver, StatsObserver, TracingObserver};
pub use strategies::calculate_delay;
