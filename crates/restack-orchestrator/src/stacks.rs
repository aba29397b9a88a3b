//! Stack deployment sequencing
//!
//! Stacks are redeployed through the management UI in priority order. The
//! phased plan deploys the foundation stack first, waits for its data
//! stores and restores them, then deploys the dependent stack (through the
//! internal platform when it is up), then sweeps the rest.

use crate::database::{DatabaseDispatcher, DatabaseOutcome, DatabaseTally};
use crate::probes::{ContainerHealthProbe, ExecProbe, PlatformHealthProbe};
use crate::provisioner::Provisioner;
use crate::report::Reporter;
use restack_backup::{BackupBundle, ContainerRecord, NetworkRecord};
use restack_core::config::RestackConfig;
use restack_core::readiness::RedundantProbe;
use restack_core::{Error, Probe, Readiness, ReadinessGate, Result};
use restack_providers::{
    ContainerRuntime, Credentials, Endpoint, ManagementApi, PlatformApi, StackDescriptor,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Priority groups first, in priority order, then the rest in discovery order
pub fn sort_by_priority<T>(
    items: Vec<T>,
    priority: &[String],
    name: impl Fn(&T) -> &str,
) -> Vec<T> {
    let mut rest = items;
    let mut ordered = Vec::with_capacity(rest.len());

    for wanted in priority {
        if let Some(index) = rest.iter().position(|item| name(item) == wanted.as_str()) {
            ordered.push(rest.remove(index));
        }
    }

    ordered.extend(rest);
    ordered
}

/// Networks a compose file declares as `external`
///
/// These must exist before the stack is deployed. The network's `name`
/// field wins over its key.
pub fn compose_external_networks(content: &str) -> Vec<String> {
    let doc: serde_yaml_ng::Value = match serde_yaml_ng::from_str(content) {
        Ok(doc) => doc,
        Err(e) => {
            debug!("stack file is not valid YAML: {}", e);
            return Vec::new();
        }
    };

    let Some(networks) = doc.get("networks").and_then(|n| n.as_mapping()) else {
        return Vec::new();
    };

    networks
        .iter()
        .filter_map(|(key, value)| {
            let external = value.get("external")?;
            let legacy_name = external.get("name").and_then(|n| n.as_str());
            if !(external.as_bool() == Some(true) || legacy_name.is_some()) {
                return None;
            }

            value
                .get("name")
                .and_then(|n| n.as_str())
                .or(legacy_name)
                .or_else(|| key.as_str())
                .map(String::from)
        })
        .collect()
}

/// Stacks deployed on `endpoint_id`
///
/// Descriptors without a recorded endpoint (id 0) are kept.
pub fn on_endpoint(stacks: Vec<StackDescriptor>, endpoint_id: i64) -> Vec<StackDescriptor> {
    stacks
        .into_iter()
        .filter(|s| {
            let keep = s.endpoint_id == endpoint_id || s.endpoint_id == 0;
            if !keep {
                debug!("Skipping stack {} on endpoint {}", s.name, s.endpoint_id);
            }
            keep
        })
        .collect()
}

/// Stack ordering settings taken from the configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencerSettings {
    pub priority: Vec<String>,
    pub foundation: String,
    pub dependent: String,
    pub endpoint: Option<String>,
    /// Stack that hosts the internal platform
    pub platform_group: String,
}

impl SequencerSettings {
    pub fn from_config(config: &RestackConfig) -> Self {
        Self {
            priority: config.stacks.priority.clone(),
            foundation: config.stacks.phased.foundation.clone(),
            dependent: config.stacks.phased.dependent.clone(),
            endpoint: config.management_ui.endpoint.clone(),
            platform_group: config.platform.group.clone(),
        }
    }
}

/// What the sequencer did
#[derive(Debug, Default)]
pub struct StackReport {
    pub deployed: Vec<String>,
    pub failed: Vec<String>,
    /// Databases restored during the phased plan
    pub databases: DatabaseTally,
    /// Containers whose database the phased plan already handled,
    /// successfully or not
    pub attempted: BTreeSet<String>,
}

/// Successful database containers belonging to `group`
///
/// Matched on the recorded stack, or on a `<group>` name prefix when the
/// manifest does not record one.
pub fn group_databases<'a>(
    records: &[&'a ContainerRecord],
    group: &str,
) -> Vec<&'a ContainerRecord> {
    records
        .iter()
        .copied()
        .filter(|r| r.is_success() && r.database.is_some())
        .filter(|r| match r.stack.as_deref() {
            Some(stack) => stack == group,
            None => r.name.starts_with(group),
        })
        .collect()
}

pub struct StackSequencer<'a> {
    runtime: Arc<dyn ContainerRuntime>,
    api: &'a dyn ManagementApi,
    platform: Option<&'a dyn PlatformApi>,
    provisioner: &'a Provisioner,
    dispatcher: &'a DatabaseDispatcher,
    gate: ReadinessGate,
    settings: SequencerSettings,
    reporter: &'a dyn Reporter,
}

impl<'a> StackSequencer<'a> {
    /// `gate` bounds the wait for a deployed stack's data stores
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        api: &'a dyn ManagementApi,
        provisioner: &'a Provisioner,
        dispatcher: &'a DatabaseDispatcher,
        gate: ReadinessGate,
        settings: SequencerSettings,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            runtime,
            api,
            platform: None,
            provisioner,
            dispatcher,
            gate,
            settings,
            reporter,
        }
    }

    pub fn with_platform(mut self, platform: Option<&'a dyn PlatformApi>) -> Self {
        self.platform = platform;
        self
    }

    /// Run the phased plan, then the sweep
    ///
    /// Fails only when nothing can be sequenced: authentication, endpoint
    /// discovery or stack listing failed. A single stack failing is counted
    /// and skipped.
    pub async fn run(
        &self,
        credentials: &Credentials,
        bundle: &BackupBundle,
        records: &[&ContainerRecord],
        restore_databases: bool,
    ) -> Result<StackReport> {
        self.api
            .authenticate(&credentials.username, &credentials.password)
            .await
            .map_err(|e| Error::remote_call("authenticate", format!("{:#}", e)))?;
        self.reporter.success("Authenticated with the management UI");

        let endpoints = self
            .api
            .list_endpoints()
            .await
            .map_err(|e| Error::remote_call("list endpoints", format!("{:#}", e)))?;
        let endpoint = self.choose_endpoint(&endpoints)?;
        info!("Deploying into endpoint {} ({})", endpoint.name, endpoint.id);

        let stacks = self
            .api
            .list_stacks()
            .await
            .map_err(|e| Error::remote_call("list stacks", format!("{:#}", e)))?;
        let stacks = on_endpoint(stacks, endpoint.id);
        let stacks = sort_by_priority(stacks, &self.settings.priority, |s| s.name.as_str());
        debug!(
            "Stack order: {}",
            stacks.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(", ")
        );

        let mut report = StackReport::default();
        let mut handled: BTreeSet<String> = BTreeSet::new();

        // Foundation: deploy, wait for its data stores, restore them
        let foundation = self.settings.foundation.clone();
        if let Some(stack) = stacks.iter().find(|s| s.name == foundation) {
            handled.insert(stack.name.clone());
            self.reporter
                .info(&format!("Deploying foundation stack {}", stack.name));
            if self.deploy_and_count(stack, endpoint.id, &mut report).await {
                let databases = group_databases(records, &stack.name);
                for record in databases {
                    let outcome = self.wait_and_restore(bundle, record, restore_databases).await;
                    if let Some(outcome) = outcome {
                        report.attempted.insert(record.name.clone());
                        report.databases.record(outcome);
                    }
                }
            }
        } else {
            debug!("Foundation stack {} not found", foundation);
        }

        // Dependent: internal platform first, management UI otherwise
        let dependent = self.settings.dependent.clone();
        let dependent_stack = stacks.iter().find(|s| s.name == dependent);
        if dependent_stack.is_some() || self.platform.is_some() {
            handled.insert(dependent.clone());
            if self.deploy_via_platform(&dependent, &report).await {
                report.deployed.push(dependent.clone());
            } else if let Some(stack) = dependent_stack {
                self.reporter
                    .info(&format!("Deploying {} through the management UI", stack.name));
                self.deploy_and_count(stack, endpoint.id, &mut report).await;
            }
        }

        // Sweep
        for stack in stacks.iter().filter(|s| !handled.contains(&s.name)) {
            self.reporter.info(&format!("Deploying stack {}", stack.name));
            self.deploy_and_count(stack, endpoint.id, &mut report).await;
        }

        Ok(report)
    }

    fn choose_endpoint<'e>(&self, endpoints: &'e [Endpoint]) -> Result<&'e Endpoint> {
        if let Some(wanted) = self.settings.endpoint.as_deref() {
            if let Some(endpoint) = endpoints.iter().find(|e| e.name == wanted) {
                return Ok(endpoint);
            }
            self.reporter
                .warn(&format!("Endpoint {} not found, using the first endpoint", wanted));
        }
        endpoints
            .first()
            .ok_or_else(|| Error::remote_call("list endpoints", "no endpoints configured"))
    }

    async fn deploy_and_count(
        &self,
        stack: &StackDescriptor,
        endpoint_id: i64,
        report: &mut StackReport,
    ) -> bool {
        match self.deploy_stack(stack, endpoint_id).await {
            Ok(()) => {
                self.reporter.success(&format!("Deployed stack {}", stack.name));
                report.deployed.push(stack.name.clone());
                true
            }
            Err(e) => {
                self.reporter
                    .error(&format!("Stack {} failed to deploy: {}", stack.name, e));
                report.failed.push(stack.name.clone());
                false
            }
        }
    }

    /// Fetch the stack file, create its external networks, redeploy
    pub async fn deploy_stack(&self, stack: &StackDescriptor, endpoint_id: i64) -> Result<()> {
        let operation = format!("deploy stack {}", stack.name);
        let content = self
            .api
            .get_stack_file(stack.id)
            .await
            .map_err(|e| Error::remote_call(&operation, format!("{:#}", e)))?;

        for network in compose_external_networks(&content) {
            let record = NetworkRecord {
                name: network,
                driver: "bridge".to_string(),
                external: true,
            };
            if let Err(e) = self.provisioner.ensure_network(&record).await {
                warn!("{}", e);
            }
        }

        self.api
            .update_stack(stack, endpoint_id, &content)
            .await
            .map_err(|e| Error::remote_call(&operation, format!("{:#}", e)))
    }

    /// Deploy `name` through the internal platform
    ///
    /// Only attempted once the stack hosting the platform is deployed.
    /// Returns false whenever the caller should fall back.
    async fn deploy_via_platform(&self, name: &str, report: &StackReport) -> bool {
        let Some(platform) = self.platform else {
            return false;
        };
        if !report.deployed.contains(&self.settings.platform_group) {
            debug!("Platform host {} not deployed", self.settings.platform_group);
            return false;
        }

        self.reporter.info("Waiting for the internal platform");
        let readiness = self.gate.wait(&PlatformHealthProbe::new(platform)).await;
        if !readiness.is_ready() {
            self.reporter.warn(&format!(
                "Internal platform not ready after {:.0}s, using the management UI",
                readiness.elapsed().as_secs_f64()
            ));
            return false;
        }

        match platform.list_projects().await {
            Ok(projects) if projects.iter().any(|p| p.name == name) => {}
            Ok(_) => {
                info!("Internal platform has no project {}", name);
                return false;
            }
            Err(e) => {
                warn!("Listing internal platform projects failed: {:#}", e);
                return false;
            }
        }

        match platform.deploy_project(name).await {
            Ok(()) => {
                self.reporter
                    .success(&format!("Deployed {} through the internal platform", name));
                true
            }
            Err(e) => {
                self.reporter.warn(&format!(
                    "Internal platform deploy of {} failed, falling back: {:#}",
                    name, e
                ));
                false
            }
        }
    }

    /// Wait on health and engine liveness together, then restore
    ///
    /// `None` when the database is left for the later database phase,
    /// which is always the case when `restore_databases` is off.
    async fn wait_and_restore(
        &self,
        bundle: &BackupBundle,
        record: &ContainerRecord,
        restore_databases: bool,
    ) -> Option<DatabaseOutcome> {
        let descriptor = record.database.as_ref()?;
        let Ok(engine) = descriptor.engine() else {
            if !restore_databases {
                return None;
            }
            return Some(self.dispatcher.restore_ready(bundle, record).await);
        };

        let probe = RedundantProbe::new(vec![
            Box::new(ContainerHealthProbe::new(self.runtime.clone(), record.name.clone()))
                as Box<dyn Probe>,
            Box::new(ExecProbe::for_engine(
                self.runtime.clone(),
                record.name.clone(),
                engine,
            )),
        ]);

        self.reporter
            .info(&format!("Waiting for {} to accept connections", record.name));
        match self.gate.wait(&probe).await {
            Readiness::Ready { .. } if restore_databases => {
                Some(self.dispatcher.restore_ready(bundle, record).await)
            }
            Readiness::Ready { .. } => None,
            other if !restore_databases => {
                self.reporter.warn(&format!(
                    "{} not ready after {:.0}s",
                    record.name,
                    other.elapsed().as_secs_f64()
                ));
                None
            }
            other => {
                let reason = format!(
                    "{} not ready after {:.0}s, skipping its database restore",
                    record.name,
                    other.elapsed().as_secs_f64()
                );
                self.reporter.warn(&reason);
                Some(DatabaseOutcome::Skipped(reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sort_by_priority() {
        let groups = names(&["z", "alexandria", "m", "ducks-ecosystem", "argos"]);
        let priority = names(&["alexandria", "ducks-ecosystem", "argos"]);

        let sorted = sort_by_priority(groups, &priority, |g| g.as_str());

        assert_eq!(
            sorted,
            names(&["alexandria", "ducks-ecosystem", "argos", "z", "m"])
        );
    }

    #[test]
    fn test_on_endpoint_keeps_matching_and_unrecorded() {
        let stack = |id: i64, endpoint_id: i64| StackDescriptor {
            id,
            name: format!("s{}", id),
            endpoint_id,
            env: Vec::new(),
        };

        let kept = on_endpoint(vec![stack(1, 1), stack(2, 2), stack(3, 0)], 1);

        let ids: Vec<i64> = kept.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_sort_with_absent_priority_groups() {
        let groups = names(&["m", "argos", "a"]);
        let priority = names(&["alexandria", "ducks-ecosystem", "argos"]);

        let sorted = sort_by_priority(groups, &priority, |g| g.as_str());

        assert_eq!(sorted, names(&["argos", "m", "a"]));
    }

    #[test]
    fn test_compose_external_networks() {
        let compose = r#"
services:
  api:
    image: api:latest
networks:
  backend:
    external: true
  shared:
    external: true
    name: shared-net
  legacy:
    external:
      name: legacy-net
  internal:
    driver: bridge
"#;
        let mut networks = compose_external_networks(compose);
        networks.sort();
        assert_eq!(networks, names(&["backend", "legacy-net", "shared-net"]));
    }

    #[test]
    fn test_compose_without_networks() {
        assert!(compose_external_networks("services: {}\n").is_empty());
        assert!(compose_external_networks(": not yaml :").is_empty());
    }
}
