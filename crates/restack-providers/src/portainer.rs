//! Portainer management UI client
//!
//! Every call is retried with exponential backoff; a missing session is an
//! error rather than an implicit login.

use crate::traits::{Endpoint, EnvVar, ManagementApi, StackDescriptor};
use crate::utils::{join_url, parse_base_url};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use restack_core::retry::{RetryExecutorBuilder, TracingObserver};
use restack_core::types::RetryPolicy;
use restack_core::Clock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the Portainer HTTP API
pub struct PortainerClient {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
    clock: Option<Arc<dyn Clock>>,
    jwt: RwLock<Option<String>>,
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    #[serde(rename = "Username")]
    username: &'a str,
    #[serde(rename = "Password")]
    password: &'a str,
}

#[derive(Deserialize)]
struct AuthResponse {
    jwt: String,
}

#[derive(Deserialize)]
struct StackFileResponse {
    #[serde(rename = "StackFileContent")]
    stack_file_content: String,
}

#[derive(Serialize)]
struct UpdateStackRequest<'a> {
    #[serde(rename = "StackFileContent")]
    stack_file_content: &'a str,
    #[serde(rename = "Env")]
    env: &'a [EnvVar],
    #[serde(rename = "Prune")]
    prune: bool,
    #[serde(rename = "PullImage")]
    pull_image: bool,
}

impl PortainerClient {
    pub fn new(base_url: impl AsRef<str>, accept_invalid_certs: bool) -> Result<Self> {
        let base_url = parse_base_url(base_url.as_ref())?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("restack/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url,
            retry: RetryPolicy::default(),
            clock: None,
            jwt: RwLock::new(None),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sleep between retries on `clock` instead of the tokio timer
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn is_authenticated(&self) -> bool {
        self.jwt.read().await.is_some()
    }

    async fn bearer(&self) -> Result<String> {
        self.jwt
            .read()
            .await
            .clone()
            .ok_or_else(|| anyhow!("Not authenticated with Portainer"))
    }

    async fn with_retry_on<T, F, Fut>(&self, operation: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut builder = RetryExecutorBuilder::new()
            .with_policy(self.retry.clone())
            .with_observer(TracingObserver::new(operation));
        if let Some(clock) = &self.clock {
            builder = builder.with_clock(clock.clone());
        }

        builder.build().execute(op).await.map_err(|err| {
            let attempts = err.attempts();
            match err.into_source() {
                Some(source) => source.context(format!(
                    "Portainer {} failed after {} attempt(s)",
                    operation, attempts
                )),
                None => anyhow!("Portainer {} was not attempted", operation),
            }
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let token = self.bearer().await?;
        let url = join_url(&self.base_url, path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("GET {} returned {}: {}", path, status, body.trim()));
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", path))
    }
}

#[async_trait]
impl ManagementApi for PortainerClient {
    async fn authenticate(&self, username: &str, password: &str) -> Result<()> {
        let url = join_url(&self.base_url, "/api/auth");
        let url = url.as_str();

        let jwt = self
            .with_retry_on("authenticate", move || async move {
                let response = self
                    .client
                    .post(url)
                    .json(&AuthRequest { username, password })
                    .send()
                    .await
                    .with_context(|| format!("Failed to reach {}", url))?;

                let status = response.status();
                if !status.is_success() {
                    return Err(anyhow!("authentication returned {}", status));
                }

                let auth: AuthResponse = response
                    .json()
                    .await
                    .context("Failed to parse authentication response")?;
                Ok(auth.jwt)
            })
            .await?;

        *self.jwt.write().await = Some(jwt);
        info!("Authenticated with Portainer at {}", self.base_url);
        Ok(())
    }

    async fn list_endpoints(&self) -> Result<Vec<Endpoint>> {
        self.with_retry_on("list endpoints", || self.get_json("/api/endpoints"))
            .await
    }

    async fn list_stacks(&self) -> Result<Vec<StackDescriptor>> {
        self.with_retry_on("list stacks", || self.get_json("/api/stacks"))
            .await
    }

    async fn get_stack_file(&self, stack_id: i64) -> Result<String> {
        let path = format!("/api/stacks/{}/file", stack_id);
        let path = path.as_str();
        let file: StackFileResponse = self
            .with_retry_on("get stack file", move || self.get_json(path))
            .await?;
        Ok(file.stack_file_content)
    }

    async fn update_stack(
        &self,
        stack: &StackDescriptor,
        endpoint_id: i64,
        file_content: &str,
    ) -> Result<()> {
        let url = join_url(
            &self.base_url,
            &format!("/api/stacks/{}?endpointId={}", stack.id, endpoint_id),
        );
        let body = UpdateStackRequest {
            stack_file_content: file_content,
            env: &stack.env,
            prune: false,
            pull_image: false,
        };

        let (url, body) = (url.as_str(), &body);

        self.with_retry_on("update stack", move || async move {
            let token = self.bearer().await?;
            debug!("PUT {}", url);

            let response = self
                .client
                .put(url)
                .bearer_auth(&token)
                .json(body)
                .send()
                .await
                .with_context(|| format!("Failed to reach {}", url))?;

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(anyhow!(
                    "deploying stack '{}' returned {}: {}",
                    stack.name,
                    status,
                    text.trim()
                ));
            }
            Ok(())
        })
        .await
    }
}
