//! Capability traits for the host a restore runs against

use anyhow::Result;
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// Health reported by a container's configured health check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Starting,
}

/// Result of inspecting a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContainerHealth {
    pub exists: bool,
    pub running: bool,

    /// `None` when the container has no health check configured
    pub health: Option<HealthStatus>,
}

impl ContainerHealth {
    pub fn missing() -> Self {
        Self::default()
    }
}

/// Standard input for an exec
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecInput {
    None,
    /// Stream this host file into the process
    File(Utf8PathBuf),
}

/// Captured output of a command run inside a container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// A throwaway helper container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EphemeralSpec {
    pub image: String,

    /// `(source, target, read_only)`; source is a volume name or host path
    pub mounts: Vec<(String, String, bool)>,

    /// Passed to `sh -c`
    pub script: String,
}

/// Container runtime operations used by a restore
///
/// One implementation shells out to the docker CLI; tests use a recording fake.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn network_exists(&self, name: &str) -> Result<bool>;

    async fn create_network(&self, name: &str, driver: &str) -> Result<()>;

    async fn volume_exists(&self, name: &str) -> Result<bool>;

    async fn create_volume(&self, name: &str) -> Result<()>;

    async fn inspect_health(&self, container: &str) -> Result<ContainerHealth>;

    async fn start_container(&self, container: &str) -> Result<()>;

    async fn stop_container(&self, container: &str) -> Result<()>;

    /// Run `command` inside a running container
    async fn exec_in(
        &self,
        container: &str,
        command: &[String],
        input: ExecInput,
    ) -> Result<ExecOutput>;

    /// Copy a host file into a container
    async fn copy_into(&self, container: &str, host_path: &Utf8Path, dest: &str) -> Result<()>;

    /// Run a helper container to completion and remove it
    async fn run_ephemeral(&self, spec: &EphemeralSpec) -> Result<ExecOutput>;

    /// `compose up -d` for a compose file
    async fn compose_up(&self, file: &Utf8Path) -> Result<()>;
}

/// Management UI endpoint (a docker environment it manages)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(rename = "Id")]
    pub id: i64,

    #[serde(rename = "Name")]
    pub name: String,
}

/// Stack environment variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

/// A stack as the management UI stores it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDescriptor {
    #[serde(rename = "Id")]
    pub id: i64,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "EndpointId", default)]
    pub endpoint_id: i64,

    #[serde(rename = "Env", default, deserialize_with = "null_as_empty")]
    pub env: Vec<EnvVar>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<EnvVar>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<EnvVar>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Management UI session operations
#[async_trait]
pub trait ManagementApi: Send + Sync {
    /// Exchange credentials for a session; later calls use it
    async fn authenticate(&self, username: &str, password: &str) -> Result<()>;

    async fn list_endpoints(&self) -> Result<Vec<Endpoint>>;

    async fn list_stacks(&self) -> Result<Vec<StackDescriptor>>;

    /// The stack's compose file content
    async fn get_stack_file(&self, stack_id: i64) -> Result<String>;

    /// Redeploy a stack with the given file content and its stored env
    async fn update_stack(
        &self,
        stack: &StackDescriptor,
        endpoint_id: i64,
        file_content: &str,
    ) -> Result<()>;
}

/// A project known to the internal platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformProject {
    pub name: String,

    #[serde(default)]
    pub status: Option<String>,
}

/// Secondary internal-platform operations
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Whether the platform answers its health endpoint
    async fn health(&self) -> Result<bool>;

    async fn list_projects(&self) -> Result<Vec<PlatformProject>>;

    async fn deploy_project(&self, name: &str) -> Result<()>;
}
