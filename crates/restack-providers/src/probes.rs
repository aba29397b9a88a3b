//! HTTP readiness probe

use async_trait::async_trait;
use restack_core::{Probe, ProbeSignal};
use std::time::Duration;

/// Healthy when `GET url` answers 2xx; anything else is still starting
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, accept_invalid_certs: bool) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    fn describe(&self) -> String {
        format!("http {}", self.url)
    }

    async fn poll(&self) -> ProbeSignal {
        match self.client.get(&self.url).send().await {
            Ok(response) if response.status().is_success() => ProbeSignal::Healthy,
            Ok(response) => {
                tracing::trace!("{} answered {}", self.url, response.status());
                ProbeSignal::Starting
            }
            Err(_) => ProbeSignal::Starting,
        }
    }
}
