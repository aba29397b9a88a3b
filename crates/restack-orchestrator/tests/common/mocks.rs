//! Recording fakes for the host collaborators
//!
//! Every call is recorded so tests can assert on exactly what a restore
//! would have done to the host.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use camino::Utf8Path;
use restack_core::{Probe, ProbeSignal};
use restack_providers::{
    ContainerHealth, ContainerRuntime, CredentialProvider, Credentials, Endpoint, EphemeralSpec,
    ExecInput, ExecOutput, HealthStatus, ManagementApi, PlatformApi, PlatformProject,
    StackDescriptor,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

// ─── Container Runtime ───────────────────────────────────────────────────────

/// One runtime call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    NetworkExists(String),
    CreateNetwork { name: String, driver: String },
    VolumeExists(String),
    CreateVolume(String),
    InspectHealth(String),
    Start(String),
    Stop(String),
    Exec {
        container: String,
        command: Vec<String>,
        input: ExecInput,
    },
    CopyInto { container: String, dest: String },
    RunEphemeral(EphemeralSpec),
    ComposeUp,
}

impl RuntimeCall {
    /// Whether the call changes host state
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Self::NetworkExists(_) | Self::VolumeExists(_) | Self::InspectHealth(_)
        )
    }
}

#[derive(Debug, Default)]
struct RuntimeState {
    networks: BTreeSet<String>,
    volumes: BTreeSet<String>,
    containers: HashMap<String, ContainerHealth>,
    failing_exec: HashMap<String, i32>,
    failing_ephemeral: BTreeSet<String>,
    compose_fails: bool,
    calls: Vec<RuntimeCall>,
}

/// In-memory docker host
#[derive(Debug, Default)]
pub struct FakeRuntime {
    state: Mutex<RuntimeState>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_network(self, name: &str) -> Self {
        self.state.lock().unwrap().networks.insert(name.to_string());
        self
    }

    pub fn with_volume(self, name: &str) -> Self {
        self.state.lock().unwrap().volumes.insert(name.to_string());
        self
    }

    /// A running container reporting `health`
    pub fn with_container(self, name: &str, health: Option<HealthStatus>) -> Self {
        self.state.lock().unwrap().containers.insert(
            name.to_string(),
            ContainerHealth {
                exists: true,
                running: true,
                health,
            },
        );
        self
    }

    /// A container that exists but is stopped
    pub fn with_stopped_container(self, name: &str) -> Self {
        self.state.lock().unwrap().containers.insert(
            name.to_string(),
            ContainerHealth {
                exists: true,
                running: false,
                health: None,
            },
        );
        self
    }

    /// Every exec in `container` exits with `code`
    pub fn failing_exec(self, container: &str, code: i32) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_exec
            .insert(container.to_string(), code);
        self
    }

    /// Helper containers mounting `volume` exit non-zero
    pub fn failing_volume(self, volume: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_ephemeral
            .insert(volume.to_string());
        self
    }

    pub fn failing_compose(self) -> Self {
        self.state.lock().unwrap().compose_fails = true;
        self
    }

    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutating_calls(&self) -> Vec<RuntimeCall> {
        self.calls().into_iter().filter(|c| c.is_mutating()).collect()
    }

    pub fn has_network(&self, name: &str) -> bool {
        self.state.lock().unwrap().networks.contains(name)
    }

    pub fn has_volume(&self, name: &str) -> bool {
        self.state.lock().unwrap().volumes.contains(name)
    }

    pub fn ephemeral_specs(&self) -> Vec<EphemeralSpec> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                RuntimeCall::RunEphemeral(spec) => Some(spec),
                _ => None,
            })
            .collect()
    }

    /// Volumes restored through helper containers, in order
    pub fn restored_volumes(&self) -> Vec<String> {
        self.ephemeral_specs()
            .into_iter()
            .filter_map(|spec| spec.mounts.first().map(|m| m.0.clone()))
            .collect()
    }

    /// Exec commands run in `container`, each joined with spaces
    pub fn execs_in(&self, container: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                RuntimeCall::Exec {
                    container: name,
                    command,
                    ..
                } if name == container => Some(command.join(" ")),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&RuntimeCall) -> bool) -> usize {
        self.calls().iter().filter(|c| predicate(c)).count()
    }

    fn record(&self, call: RuntimeCall) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn network_exists(&self, name: &str) -> Result<bool> {
        self.record(RuntimeCall::NetworkExists(name.to_string()));
        Ok(self.has_network(name))
    }

    async fn create_network(&self, name: &str, driver: &str) -> Result<()> {
        self.record(RuntimeCall::CreateNetwork {
            name: name.to_string(),
            driver: driver.to_string(),
        });
        let mut state = self.state.lock().unwrap();
        if !state.networks.insert(name.to_string()) {
            return Err(anyhow!("network with name {} already exists", name));
        }
        Ok(())
    }

    async fn volume_exists(&self, name: &str) -> Result<bool> {
        self.record(RuntimeCall::VolumeExists(name.to_string()));
        Ok(self.has_volume(name))
    }

    async fn create_volume(&self, name: &str) -> Result<()> {
        self.record(RuntimeCall::CreateVolume(name.to_string()));
        self.state.lock().unwrap().volumes.insert(name.to_string());
        Ok(())
    }

    async fn inspect_health(&self, container: &str) -> Result<ContainerHealth> {
        self.record(RuntimeCall::InspectHealth(container.to_string()));
        Ok(self
            .state
            .lock()
            .unwrap()
            .containers
            .get(container)
            .copied()
            .unwrap_or_else(ContainerHealth::missing))
    }

    async fn start_container(&self, container: &str) -> Result<()> {
        self.record(RuntimeCall::Start(container.to_string()));
        let mut state = self.state.lock().unwrap();
        match state.containers.get_mut(container) {
            Some(health) => {
                health.running = true;
                Ok(())
            }
            None => Err(anyhow!("No such container: {}", container)),
        }
    }

    async fn stop_container(&self, container: &str) -> Result<()> {
        self.record(RuntimeCall::Stop(container.to_string()));
        if let Some(health) = self.state.lock().unwrap().containers.get_mut(container) {
            health.running = false;
        }
        Ok(())
    }

    async fn exec_in(
        &self,
        container: &str,
        command: &[String],
        input: ExecInput,
    ) -> Result<ExecOutput> {
        self.record(RuntimeCall::Exec {
            container: container.to_string(),
            command: command.to_vec(),
            input,
        });
        let code = self
            .state
            .lock()
            .unwrap()
            .failing_exec
            .get(container)
            .copied()
            .unwrap_or(0);
        Ok(ExecOutput {
            code,
            stdout: String::new(),
            stderr: if code == 0 { String::new() } else { "exec failed".to_string() },
        })
    }

    async fn copy_into(&self, container: &str, host_path: &Utf8Path, dest: &str) -> Result<()> {
        if !host_path.is_file() {
            return Err(anyhow!("{} does not exist", host_path));
        }
        self.record(RuntimeCall::CopyInto {
            container: container.to_string(),
            dest: dest.to_string(),
        });
        Ok(())
    }

    async fn run_ephemeral(&self, spec: &EphemeralSpec) -> Result<ExecOutput> {
        self.record(RuntimeCall::RunEphemeral(spec.clone()));
        let fails = spec
            .mounts
            .first()
            .is_some_and(|m| self.state.lock().unwrap().failing_ephemeral.contains(&m.0));
        Ok(ExecOutput {
            code: if fails { 2 } else { 0 },
            stdout: String::new(),
            stderr: if fails { "tar: corrupt".to_string() } else { String::new() },
        })
    }

    async fn compose_up(&self, _file: &Utf8Path) -> Result<()> {
        self.record(RuntimeCall::ComposeUp);
        if self.state.lock().unwrap().compose_fails {
            return Err(anyhow!("compose up failed"));
        }
        Ok(())
    }
}

// ─── Management UI ───────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct ManagementState {
    authenticated: bool,
    updated: Vec<String>,
    endpoints_used: Vec<(String, i64)>,
}

/// Management UI holding a fixed set of stacks
#[derive(Debug, Default)]
pub struct FakeManagement {
    reject_auth: bool,
    endpoints: Vec<Endpoint>,
    stacks: Vec<StackDescriptor>,
    files: BTreeMap<i64, String>,
    failing: BTreeSet<String>,
    state: Mutex<ManagementState>,
}

impl FakeManagement {
    pub fn new() -> Self {
        Self {
            endpoints: vec![Endpoint {
                id: 1,
                name: "local".to_string(),
            }],
            ..Default::default()
        }
    }

    pub fn rejecting_auth(mut self) -> Self {
        self.reject_auth = true;
        self
    }

    pub fn with_endpoint(mut self, id: i64, name: &str) -> Self {
        self.endpoints.push(Endpoint {
            id,
            name: name.to_string(),
        });
        self
    }

    pub fn with_stack(self, id: i64, name: &str, file: &str) -> Self {
        self.with_stack_on(1, id, name, file)
    }

    pub fn with_stack_on(mut self, endpoint_id: i64, id: i64, name: &str, file: &str) -> Self {
        self.stacks.push(StackDescriptor {
            id,
            name: name.to_string(),
            endpoint_id,
            env: Vec::new(),
        });
        self.files.insert(id, file.to_string());
        self
    }

    /// `update_stack` for `name` errors
    pub fn failing_stack(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    /// Stacks redeployed, in call order
    pub fn updated(&self) -> Vec<String> {
        self.state.lock().unwrap().updated.clone()
    }

    /// Stack name and target endpoint of every redeploy
    pub fn endpoints_used(&self) -> Vec<(String, i64)> {
        self.state.lock().unwrap().endpoints_used.clone()
    }

    fn require_session(&self) -> Result<()> {
        if self.state.lock().unwrap().authenticated {
            Ok(())
        } else {
            Err(anyhow!("401 Unauthorized"))
        }
    }
}

#[async_trait]
impl ManagementApi for FakeManagement {
    async fn authenticate(&self, _username: &str, _password: &str) -> Result<()> {
        if self.reject_auth {
            return Err(anyhow!("Invalid credentials"));
        }
        self.state.lock().unwrap().authenticated = true;
        Ok(())
    }

    async fn list_endpoints(&self) -> Result<Vec<Endpoint>> {
        self.require_session()?;
        Ok(self.endpoints.clone())
    }

    async fn list_stacks(&self) -> Result<Vec<StackDescriptor>> {
        self.require_session()?;
        Ok(self.stacks.clone())
    }

    async fn get_stack_file(&self, stack_id: i64) -> Result<String> {
        self.require_session()?;
        self.files
            .get(&stack_id)
            .cloned()
            .ok_or_else(|| anyhow!("stack {} not found", stack_id))
    }

    async fn update_stack(
        &self,
        stack: &StackDescriptor,
        endpoint_id: i64,
        _file_content: &str,
    ) -> Result<()> {
        self.require_session()?;
        if self.failing.contains(&stack.name) {
            return Err(anyhow!("500 Internal Server Error"));
        }
        let mut state = self.state.lock().unwrap();
        state.updated.push(stack.name.clone());
        state.endpoints_used.push((stack.name.clone(), endpoint_id));
        Ok(())
    }
}

// ─── Internal Platform ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct FakePlatform {
    healthy: bool,
    /// Health polls answered false before turning healthy
    unhealthy_polls: u32,
    health_polls: Mutex<u32>,
    projects: Vec<String>,
    deploy_fails: bool,
    deployed: Mutex<Vec<String>>,
}

impl FakePlatform {
    pub fn healthy(projects: &[&str]) -> Self {
        Self {
            healthy: true,
            projects: projects.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn down() -> Self {
        Self::default()
    }

    /// Answers `polls` health checks with false first
    pub fn healthy_after(mut self, polls: u32) -> Self {
        self.unhealthy_polls = polls;
        self
    }

    pub fn health_polls(&self) -> u32 {
        *self.health_polls.lock().unwrap()
    }

    pub fn failing_deploys(mut self) -> Self {
        self.deploy_fails = true;
        self
    }

    pub fn deployed(&self) -> Vec<String> {
        self.deployed.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformApi for FakePlatform {
    async fn health(&self) -> Result<bool> {
        let mut polls = self.health_polls.lock().unwrap();
        *polls += 1;
        Ok(self.healthy && *polls > self.unhealthy_polls)
    }

    async fn list_projects(&self) -> Result<Vec<PlatformProject>> {
        Ok(self
            .projects
            .iter()
            .map(|name| PlatformProject {
                name: name.clone(),
                status: Some("stopped".to_string()),
            })
            .collect())
    }

    async fn deploy_project(&self, name: &str) -> Result<()> {
        if self.deploy_fails {
            return Err(anyhow!("deploy of {} failed", name));
        }
        self.deployed.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

// ─── Credentials & Probes ────────────────────────────────────────────────────

/// Always yields the same credentials
pub struct StaticCredentials;

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn resolve(&self) -> Result<Option<Credentials>> {
        Ok(Some(Credentials::new("admin", "secret")))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Always answers the same signal
pub struct FixedProbe(pub ProbeSignal);

#[async_trait]
impl Probe for FixedProbe {
    fn describe(&self) -> String {
        format!("fixed {:?}", self.0)
    }

    async fn poll(&self) -> ProbeSignal {
        self.0
    }
}
