//! Readiness probes backed by the container runtime

use async_trait::async_trait;
use restack_backup::DatabaseEngine;
use restack_core::{Probe, ProbeSignal};
use restack_providers::{ContainerRuntime, ExecInput, HealthStatus, PlatformApi};
use std::sync::Arc;
use tracing::debug;

/// Watches a container's state and its configured health check
pub struct ContainerHealthProbe {
    runtime: Arc<dyn ContainerRuntime>,
    container: String,
}

impl ContainerHealthProbe {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, container: impl Into<String>) -> Self {
        Self {
            runtime,
            container: container.into(),
        }
    }
}

#[async_trait]
impl Probe for ContainerHealthProbe {
    fn describe(&self) -> String {
        format!("container {}", self.container)
    }

    async fn poll(&self) -> ProbeSignal {
        let health = match self.runtime.inspect_health(&self.container).await {
            Ok(health) => health,
            Err(e) => {
                debug!("inspect {} failed: {:#}", self.container, e);
                return ProbeSignal::Unavailable;
            }
        };

        if !health.exists || !health.running {
            return ProbeSignal::Unavailable;
        }

        match health.health {
            Some(HealthStatus::Healthy) => ProbeSignal::Healthy,
            Some(HealthStatus::Unhealthy) => ProbeSignal::Unhealthy,
            Some(HealthStatus::Starting) => ProbeSignal::Starting,
            None => ProbeSignal::NoHealthCheck,
        }
    }
}

/// Healthy once a command exits zero inside the container
pub struct ExecProbe {
    runtime: Arc<dyn ContainerRuntime>,
    container: String,
    command: Vec<String>,
}

impl ExecProbe {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        container: impl Into<String>,
        command: Vec<String>,
    ) -> Self {
        Self {
            runtime,
            container: container.into(),
            command,
        }
    }

    /// Engine-specific "accepting connections" check
    pub fn for_engine(
        runtime: Arc<dyn ContainerRuntime>,
        container: impl Into<String>,
        engine: DatabaseEngine,
    ) -> Self {
        Self::new(runtime, container, liveness_command(engine))
    }
}

#[async_trait]
impl Probe for ExecProbe {
    fn describe(&self) -> String {
        format!("exec {} in {}", self.command.join(" "), self.container)
    }

    async fn poll(&self) -> ProbeSignal {
        match self
            .runtime
            .exec_in(&self.container, &self.command, ExecInput::None)
            .await
        {
            Ok(output) if output.success() => ProbeSignal::Healthy,
            Ok(_) => ProbeSignal::Starting,
            Err(e) => {
                debug!("liveness exec in {} failed: {:#}", self.container, e);
                ProbeSignal::Unavailable
            }
        }
    }
}

/// Healthy once the internal platform answers its health endpoint
pub struct PlatformHealthProbe<'a> {
    platform: &'a dyn PlatformApi,
}

impl<'a> PlatformHealthProbe<'a> {
    pub fn new(platform: &'a dyn PlatformApi) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl Probe for PlatformHealthProbe<'_> {
    fn describe(&self) -> String {
        "internal platform".to_string()
    }

    async fn poll(&self) -> ProbeSignal {
        match self.platform.health().await {
            Ok(true) => ProbeSignal::Healthy,
            Ok(false) => ProbeSignal::Starting,
            Err(e) => {
                debug!("platform health check failed: {:#}", e);
                ProbeSignal::Starting
            }
        }
    }
}

/// Command that exits zero once `engine` accepts connections
pub fn liveness_command(engine: DatabaseEngine) -> Vec<String> {
    let script = match engine {
        DatabaseEngine::Postgres => return vec!["pg_isready".to_string()],
        DatabaseEngine::MySql | DatabaseEngine::MariaDb => {
            "mariadb-admin ping --silent 2>/dev/null || mysqladmin ping --silent"
        }
        DatabaseEngine::MongoDb => {
            "mongosh --quiet --eval 'db.adminCommand(\"ping\")' 2>/dev/null \
             || mongo --quiet --eval 'db.adminCommand(\"ping\")'"
        }
    };
    vec!["sh".to_string(), "-c".to_string(), script.to_string()]
}
