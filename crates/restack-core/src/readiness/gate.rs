//! Bounded polling state machine
//!
//! `POLLING -> { READY, UNHEALTHY, TIMED_OUT }`. The gate polls at a fixed
//! interval; the last sleep is clipped so a target that never settles times
//! out exactly at `max_wait`.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::probe::{Probe, ProbeSignal};
use crate::error::{Error, Result};

/// Default interval between polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Terminal outcome of a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready { elapsed: Duration, polls: u32 },
    Unhealthy { elapsed: Duration, polls: u32 },
    TimedOut { elapsed: Duration, polls: u32 },
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            Self::Ready { elapsed, .. }
            | Self::Unhealthy { elapsed, .. }
            | Self::TimedOut { elapsed, .. } => *elapsed,
        }
    }

    pub fn polls(&self) -> u32 {
        match self {
            Self::Ready { polls, .. }
            | Self::Unhealthy { polls, .. }
            | Self::TimedOut { polls, .. } => *polls,
        }
    }

    /// Convert to a result, naming the target in the error
    pub fn into_result(self, target: &str) -> Result<Duration> {
        match self {
            Self::Ready { elapsed, .. } => Ok(elapsed),
            Self::Unhealthy { .. } => Err(Error::unhealthy(target)),
            Self::TimedOut { elapsed, .. } => Err(Error::readiness_timeout(target, elapsed)),
        }
    }
}

/// Polls a probe until it reaches a terminal state or the deadline passes
#[derive(Clone)]
pub struct ReadinessGate {
    clock: Arc<dyn Clock>,
    interval: Duration,
    max_wait: Duration,
}

impl ReadinessGate {
    pub fn new(clock: Arc<dyn Clock>, interval: Duration, max_wait: Duration) -> Self {
        Self {
            clock,
            interval: interval.max(Duration::from_millis(1)),
            max_wait,
        }
    }

    /// Same clock and interval, different bound
    pub fn with_max_wait(&self, max_wait: Duration) -> Self {
        Self {
            clock: self.clock.clone(),
            interval: self.interval,
            max_wait,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Block until the probe settles
    pub async fn wait(&self, probe: &dyn Probe) -> Readiness {
        let target = probe.describe();
        let start = self.clock.now();
        let mut polls = 0u32;
        let mut grace_pending = false;

        loop {
            polls += 1;
            let signal = probe.poll().await;
            let elapsed = self.clock.now().saturating_sub(start);
            debug!(
                target = %target,
                poll = polls,
                elapsed_ms = elapsed.as_millis() as u64,
                signal = ?signal,
                "readiness poll"
            );

            match signal {
                ProbeSignal::Healthy => {
                    info!("{} is ready after {:.0}s", target, elapsed.as_secs_f64());
                    return Readiness::Ready { elapsed, polls };
                }
                ProbeSignal::Unhealthy => {
                    warn!("{} reported unhealthy", target);
                    return Readiness::Unhealthy { elapsed, polls };
                }
                ProbeSignal::NoHealthCheck => {
                    if grace_pending {
                        info!("{} is running without a health check, treating as ready", target);
                        return Readiness::Ready { elapsed, polls };
                    }
                    grace_pending = true;
                }
                ProbeSignal::Starting | ProbeSignal::Unavailable => {
                    grace_pending = false;
                }
            }

            if elapsed >= self.max_wait {
                warn!(
                    "{} not ready after {:.0}s ({} polls)",
                    target,
                    elapsed.as_secs_f64(),
                    polls
                );
                return Readiness::TimedOut { elapsed, polls };
            }

            let remaining = self.max_wait - elapsed;
            self.clock.sleep(self.interval.min(remaining)).await;
        }
    }
}
