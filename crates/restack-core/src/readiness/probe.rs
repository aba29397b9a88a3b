//! Readiness probes
//!
//! A probe answers one question per poll: what does the target look like
//! right now? The gate turns a sequence of answers into a terminal outcome.

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// One observation of a target resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeSignal {
    /// Explicit healthy signal
    Healthy,
    /// Explicit unhealthy signal, terminal
    Unhealthy,
    /// Health check configured but not decided yet
    Starting,
    /// Resource is running and has no health check configured at all
    NoHealthCheck,
    /// Resource missing, not running, or the probe could not answer
    Unavailable,
}

/// A pollable readiness check
#[async_trait]
pub trait Probe: Send + Sync {
    /// Human readable target description for logs
    fn describe(&self) -> String;

    /// Take one observation
    async fn poll(&self) -> ProbeSignal;
}

#[async_trait]
impl<T: Probe + ?Sized> Probe for Box<T> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    async fn poll(&self) -> ProbeSignal {
        (**self).poll().await
    }
}

/// Healthy once a TCP connection to `address` is accepted
#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: String,
    connect_timeout: Duration,
}

impl TcpProbe {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            connect_timeout: Duration::from_secs(2),
        }
    }
}

#[async_trait]
impl Probe for TcpProbe {
    fn describe(&self) -> String {
        format!("tcp://{}", self.address)
    }

    async fn poll(&self) -> ProbeSignal {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.address)).await
        {
            Ok(Ok(_)) => ProbeSignal::Healthy,
            Ok(Err(e)) => {
                debug!("TCP probe {} refused: {}", self.address, e);
                ProbeSignal::Starting
            }
            Err(_) => ProbeSignal::Starting,
        }
    }
}

/// Several probes watching the same target, any of which may prove readiness
///
/// - any member healthy: healthy
/// - every member unhealthy: unhealthy
/// - otherwise: starting (the no-health-check grace rule is not applied,
///   a redundant liveness probe is expected to settle it)
pub struct RedundantProbe {
    probes: Vec<Box<dyn Probe>>,
}

impl RedundantProbe {
    pub fn new(probes: Vec<Box<dyn Probe>>) -> Self {
        Self { probes }
    }
}

#[async_trait]
impl Probe for RedundantProbe {
    fn describe(&self) -> String {
        self.probes
            .iter()
            .map(|p| p.describe())
            .collect::<Vec<_>>()
            .join(" | ")
    }

    async fn poll(&self) -> ProbeSignal {
        if self.probes.is_empty() {
            return ProbeSignal::Unavailable;
        }

        let mut unhealthy = 0;
        for probe in &self.probes {
            match probe.poll().await {
                ProbeSignal::Healthy => return ProbeSignal::Healthy,
                ProbeSignal::Unhealthy => unhealthy += 1,
                _ => {}
            }
        }

        if unhealthy == self.probes.len() {
            ProbeSignal::Unhealthy
        } else {
            ProbeSignal::Starting
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(ProbeSignal);

    #[async_trait]
    impl Probe for Fixed {
        fn describe(&self) -> String {
            format!("fixed {:?}", self.0)
        }

        async fn poll(&self) -> ProbeSignal {
            self.0
        }
    }

    fn redundant(signals: &[ProbeSignal]) -> RedundantProbe {
        RedundantProbe::new(
            signals
                .iter()
                .map(|s| Box::new(Fixed(*s)) as Box<dyn Probe>)
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_redundant_any_healthy_wins() {
        let probe = redundant(&[ProbeSignal::Unhealthy, ProbeSignal::Healthy]);
        assert_eq!(probe.poll().await, ProbeSignal::Healthy);
    }

    #[tokio::test]
    async fn test_redundant_all_unhealthy() {
        let probe = redundant(&[ProbeSignal::Unhealthy, ProbeSignal::Unhealthy]);
        assert_eq!(probe.poll().await, ProbeSignal::Unhealthy);
    }

    #[tokio::test]
    async fn test_redundant_mixed_keeps_polling() {
        let probe = redundant(&[ProbeSignal::NoHealthCheck, ProbeSignal::Unhealthy]);
        assert_eq!(probe.poll().await, ProbeSignal::Starting);
    }

    #[tokio::test]
    async fn test_redundant_empty_is_unavailable() {
        assert_eq!(redundant(&[]).poll().await, ProbeSignal::Unavailable);
    }

    #[tokio::test]
    async fn test_tcp_probe_against_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let probe = TcpProbe::new(addr.clone());
        assert_eq!(probe.poll().await, ProbeSignal::Healthy);
        assert_eq!(probe.describe(), format!("tcp://{}", addr));

        drop(listener);
        assert_eq!(probe.poll().await, ProbeSignal::Starting);
    }
}
