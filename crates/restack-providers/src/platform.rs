//! Internal platform API client
//!
//! The platform is itself one of the restored stacks. Once it answers its
//! health endpoint it can deploy the projects it manages by name.

use crate::traits::{PlatformApi, PlatformProject};
use crate::utils::{join_url, parse_base_url};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use restack_core::retry::retry;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEPLOY_ATTEMPTS: u32 = 3;
const DEPLOY_INITIAL_DELAY: Duration = Duration::from_secs(2);

/// Client for the platform's project API
pub struct PlatformClient {
    client: reqwest::Client,
    base_url: String,
}

/// `/api/projects` answers either a bare list or `{ "projects": [...] }`
#[derive(Deserialize)]
#[serde(untagged)]
enum ProjectList {
    Bare(Vec<PlatformProject>),
    Wrapped { projects: Vec<PlatformProject> },
}

impl PlatformClient {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let base_url = parse_base_url(base_url.as_ref())?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("restack/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether a project with this exact name exists
    pub async fn has_project(&self, name: &str) -> Result<bool> {
        Ok(self.list_projects().await?.iter().any(|p| p.name == name))
    }
}

#[async_trait]
impl PlatformApi for PlatformClient {
    async fn health(&self) -> Result<bool> {
        let url = join_url(&self.base_url, "/health");
        debug!("GET {}", url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(err) => {
                debug!("platform health check failed: {}", err);
                Ok(false)
            }
        }
    }

    async fn list_projects(&self) -> Result<Vec<PlatformProject>> {
        let url = join_url(&self.base_url, "/api/projects");
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("listing projects returned {}", status));
        }

        let list: ProjectList = response
            .json()
            .await
            .context("Failed to parse project list")?;

        Ok(match list {
            ProjectList::Bare(projects) => projects,
            ProjectList::Wrapped { projects } => projects,
        })
    }

    async fn deploy_project(&self, name: &str) -> Result<()> {
        let url = join_url(&self.base_url, &format!("/api/projects/{}/deploy", name));
        let url = url.as_str();

        retry(
            move || async move {
                debug!("POST {}", url);
                let response = self
                    .client
                    .post(url)
                    .send()
                    .await
                    .with_context(|| format!("Failed to reach {}", url))?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(anyhow!(
                        "deploying project '{}' returned {}: {}",
                        name,
                        status,
                        body.trim()
                    ));
                }
                Ok(())
            },
            DEPLOY_ATTEMPTS,
            DEPLOY_INITIAL_DELAY,
        )
        .await
        .map_err(|err| {
            let attempts = err.attempts();
            err.into_source()
                .unwrap_or_else(|| anyhow!("deploy was not attempted"))
                .context(format!(
                    "Platform deploy of '{}' failed after {} attempt(s)",
                    name, attempts
                ))
        })
    }
}
