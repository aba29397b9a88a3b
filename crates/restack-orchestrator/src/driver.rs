//! Restore phase driver
//!
//! Phases run strictly in order on a single task:
//!
//! ```text
//! VALIDATE -> EXTRACT -> PARSE -> [DRY RUN] -> MANAGEMENT UI -> NETWORKS
//!          -> VOLUMES -> SERVICES -> DATABASES -> SUMMARY
//! ```
//!
//! Only the first three can fail the run. Every later failure is reported,
//! counted in the summary, and the next unit or phase carries on. The
//! extracted bundle lives in a temporary directory owned by `run`, so it is
//! removed however the run ends.

use crate::database::DatabaseDispatcher;
use crate::probes::ContainerHealthProbe;
use crate::provisioner::{Provisioned, Provisioner};
use crate::report::{DryRunReport, Reporter, TracingReporter};
use crate::stacks::{SequencerSettings, StackSequencer};
use crate::summary::RestoreSummary;
use camino::Utf8Path;
use restack_backup::{
    filter_containers, validate_input, BackupBundle, BackupManifest, ContainerRecord, RestorePlan,
};
use restack_core::config::RestackConfig;
use restack_core::readiness::RedundantProbe;
use restack_core::{Clock, Probe, ReadinessGate, Result, TokioClock};
use restack_providers::{
    ContainerRuntime, CredentialProvider, Credentials, HttpProbe, ManagementApi, PlatformApi,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Builds an [`Orchestrator`]
pub struct OrchestratorBuilder {
    runtime: Arc<dyn ContainerRuntime>,
    config: RestackConfig,
    clock: Arc<dyn Clock>,
    reporter: Arc<dyn Reporter>,
    management: Option<Arc<dyn ManagementApi>>,
    platform: Option<Arc<dyn PlatformApi>>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    management_ui_probe: Option<Box<dyn Probe>>,
}

impl OrchestratorBuilder {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            runtime,
            config: RestackConfig::default(),
            clock: Arc::new(TokioClock::new()),
            reporter: Arc::new(TracingReporter),
            management: None,
            platform: None,
            credentials: None,
            management_ui_probe: None,
        }
    }

    pub fn config(mut self, config: RestackConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn management_api(mut self, api: Arc<dyn ManagementApi>) -> Self {
        self.management = Some(api);
        self
    }

    pub fn platform_api(mut self, api: Arc<dyn PlatformApi>) -> Self {
        self.platform = Some(api);
        self
    }

    pub fn credentials(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(provider);
        self
    }

    /// Replace the HTTP status probe used after restoring the management UI
    pub fn management_ui_probe(mut self, probe: Box<dyn Probe>) -> Self {
        self.management_ui_probe = Some(probe);
        self
    }

    pub fn build(self) -> Orchestrator {
        let provisioner = Provisioner::new(
            self.runtime.clone(),
            self.config.runtime.helper_image.clone(),
        );

        Orchestrator {
            runtime: self.runtime,
            config: self.config,
            clock: self.clock,
            reporter: self.reporter,
            management: self.management,
            platform: self.platform,
            credentials: self.credentials,
            management_ui_probe: self.management_ui_probe,
            provisioner,
        }
    }
}

/// Runs a full restore from a backup archive
pub struct Orchestrator {
    runtime: Arc<dyn ContainerRuntime>,
    config: RestackConfig,
    clock: Arc<dyn Clock>,
    reporter: Arc<dyn Reporter>,
    management: Option<Arc<dyn ManagementApi>>,
    platform: Option<Arc<dyn PlatformApi>>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    management_ui_probe: Option<Box<dyn Probe>>,
    provisioner: Provisioner,
}

impl Orchestrator {
    pub fn builder(runtime: Arc<dyn ContainerRuntime>) -> OrchestratorBuilder {
        OrchestratorBuilder::new(runtime)
    }

    fn gate(&self, max_wait: std::time::Duration) -> ReadinessGate {
        ReadinessGate::new(
            self.clock.clone(),
            self.config.readiness.poll_interval(),
            max_wait,
        )
    }

    fn dispatcher(&self) -> DatabaseDispatcher {
        DatabaseDispatcher::new(
            self.runtime.clone(),
            self.gate(self.config.readiness.database_wait()),
            self.config.readiness.settle_delay(),
            self.reporter.clone(),
        )
    }

    /// Restore everything in `archive` according to `plan`
    ///
    /// Errors only on unusable input. A returned summary may still record
    /// failures.
    #[instrument(skip_all, fields(archive = %archive))]
    pub async fn run(&self, archive: &Utf8Path, plan: &RestorePlan) -> Result<RestoreSummary> {
        self.reporter.phase("Validating input");
        validate_input(archive)?;

        self.reporter.phase("Extracting backup");
        let bundle = BackupBundle::extract(archive)?;
        debug!("Extracted to {}", bundle.root());

        self.reporter.phase("Reading manifest");
        let manifest = bundle.load_manifest()?;
        self.reporter.info(&format!(
            "Backup {} ({}): {} container(s)",
            manifest.id, manifest.name, manifest.summary.total_containers
        ));

        let mut summary = RestoreSummary::new(&manifest.id, &manifest.name);
        for name in bundle.missing_data_paths(&manifest) {
            let message = format!("Backup has no data directory for {}", name);
            self.reporter.warn(&message);
            summary.warn(message);
        }

        let selected = filter_containers(&manifest, plan.filter());
        if let Some(filter) = plan.filter() {
            if selected.is_empty() {
                let message = format!("No container named {} in this backup", filter);
                self.reporter.warn(&message);
                summary.warn(message);
            }
        }

        if plan.dry_run {
            self.reporter.phase("Dry run");
            self.reporter.dry_run(&DryRunReport::new(&manifest, plan));
            summary.dry_run = true;
            self.reporter.summary(&summary);
            return Ok(summary);
        }

        summary.containers_skipped = manifest.containers.len() - selected.len();
        let mut restorable = Vec::with_capacity(selected.len());
        for record in selected {
            if record.is_success() {
                restorable.push(record);
            } else {
                self.reporter.warn(&format!(
                    "Skipping {}: it failed during backup",
                    record.name
                ));
                summary.containers_skipped += 1;
            }
        }

        if plan.skip_management_ui {
            info!("Skipping management UI restore");
        } else {
            self.restore_management_ui(&bundle, &manifest, plan, &mut summary)
                .await;
        }

        if plan.skip_networks {
            info!("Skipping network creation");
        } else {
            self.create_networks(&manifest, &mut summary).await;
        }

        self.restore_volumes(&bundle, &restorable, &mut summary).await;

        let covered = if plan.skip_compose {
            info!("Skipping service deployment");
            BTreeSet::new()
        } else {
            self.deploy_services(&bundle, &restorable, plan, &mut summary)
                .await
        };

        if plan.skip_databases {
            info!("Skipping database restore");
        } else {
            self.reporter.phase("Restoring databases");
            let tally = self
                .dispatcher()
                .restore_all(&bundle, &restorable, &covered)
                .await;
            summary.databases_restored += tally.restored;
            summary.databases_failed += tally.failed;
            summary.databases_skipped += tally.skipped;
            summary.warnings.extend(tally.warnings);
        }

        self.reporter.phase("Summary");
        self.reporter.summary(&summary);
        Ok(summary)
    }

    async fn restore_management_ui(
        &self,
        bundle: &BackupBundle,
        manifest: &BackupManifest,
        plan: &RestorePlan,
        summary: &mut RestoreSummary,
    ) {
        if !manifest.management_ui_backup_included {
            debug!("Backup does not include the management UI");
            return;
        }
        if plan.filter().is_some() {
            info!("Container filter set, leaving the management UI alone");
            return;
        }

        self.reporter.phase("Restoring management UI");
        let Some(archive) = bundle.management_ui_archive() else {
            let message = "Manifest lists a management UI backup but the archive is missing";
            self.reporter.warn(message);
            summary.warn(message);
            return;
        };

        let settings = &self.config.management_ui;
        let present = match self.runtime.inspect_health(&settings.container).await {
            Ok(health) => health.exists,
            Err(e) => {
                debug!("inspect {} failed: {:#}", settings.container, e);
                false
            }
        };

        if present {
            if let Err(e) = self.runtime.stop_container(&settings.container).await {
                self.reporter
                    .warn(&format!("Could not stop {}: {:#}", settings.container, e));
            }
        }

        match self.provisioner.restore_volume(&settings.volume, &archive).await {
            Ok(()) => {
                summary.volumes_restored += 1;
                self.reporter
                    .success(&format!("Restored management UI volume {}", settings.volume));
            }
            Err(e) => {
                summary.volumes_failed += 1;
                self.reporter.error(&e.to_string());
                summary.warn(e.to_string());
            }
        }

        if !present {
            let message = format!(
                "Management UI container {} is not present, start it to use the restored data",
                settings.container
            );
            self.reporter.warn(&message);
            summary.warn(message);
            return;
        }

        if let Err(e) = self.runtime.start_container(&settings.container).await {
            let message = format!("Could not start {}: {:#}", settings.container, e);
            self.reporter.error(&message);
            summary.warn(message);
            return;
        }

        let gate = self.gate(self.config.readiness.management_ui_wait());
        let container_probe = Box::new(ContainerHealthProbe::new(
            self.runtime.clone(),
            settings.container.clone(),
        )) as Box<dyn Probe>;

        let readiness = match &self.management_ui_probe {
            Some(probe) => gate.wait(probe.as_ref()).await,
            None => {
                let status_url = format!("{}/api/status", settings.url.trim_end_matches('/'));
                let mut probes = vec![container_probe];
                match HttpProbe::new(status_url, settings.accept_invalid_certs) {
                    Ok(http) => probes.insert(0, Box::new(http)),
                    Err(e) => debug!("HTTP probe unavailable: {:#}", e),
                }
                gate.wait(&RedundantProbe::new(probes)).await
            }
        };

        if readiness.is_ready() {
            self.reporter.success("Management UI is up");
        } else {
            let message = format!(
                "Management UI not ready after {:.0}s",
                readiness.elapsed().as_secs_f64()
            );
            self.reporter.warn(&message);
            summary.warn(message);
        }
    }

    async fn create_networks(&self, manifest: &BackupManifest, summary: &mut RestoreSummary) {
        self.reporter.phase("Creating networks");
        if manifest.networks.is_empty() {
            self.reporter.info("No networks recorded in the backup");
            return;
        }

        for network in &manifest.networks {
            match self.provisioner.ensure_network(network).await {
                Ok(Provisioned::Created) => {
                    summary.networks_created += 1;
                    self.reporter
                        .success(&format!("Created network {}", network.name));
                }
                Ok(Provisioned::AlreadyExists) => {
                    summary.networks_existing += 1;
                    self.reporter
                        .info(&format!("Network {} already exists", network.name));
                }
                Err(e) => {
                    summary.networks_failed += 1;
                    self.reporter.error(&e.to_string());
                    summary.warn(e.to_string());
                }
            }
        }
    }

    async fn restore_volumes(
        &self,
        bundle: &BackupBundle,
        records: &[&ContainerRecord],
        summary: &mut RestoreSummary,
    ) {
        self.reporter.phase("Restoring volumes");
        for record in records {
            if record.volume_files.is_empty() {
                debug!("{} has no volumes", record.name);
                continue;
            }

            let tally = self.provisioner.restore_container_volumes(bundle, record).await;
            if tally.failed == 0 {
                self.reporter.success(&format!(
                    "Restored {} volume(s) for {}",
                    tally.restored, record.name
                ));
            } else {
                for err in &tally.errors {
                    self.reporter.error(&err.to_string());
                }
            }

            summary.volumes_restored += tally.restored;
            summary.volumes_failed += tally.failed;
            summary
                .warnings
                .extend(tally.errors.iter().map(|e| e.to_string()));
        }
    }

    /// Bring services up and return the containers whose database was
    /// already restored along the way
    async fn deploy_services(
        &self,
        bundle: &BackupBundle,
        records: &[&ContainerRecord],
        plan: &RestorePlan,
        summary: &mut RestoreSummary,
    ) -> BTreeSet<String> {
        self.reporter.phase("Deploying services");

        if plan.filter().is_some() {
            self.start_containers(records, summary).await;
            return BTreeSet::new();
        }

        if let Some(api) = self.management.as_deref() {
            match self.resolve_credentials().await {
                Some(credentials) => {
                    match self
                        .deploy_stacks(api, &credentials, bundle, records, plan, summary)
                        .await
                    {
                        Ok(covered) => return covered,
                        Err(e) => {
                            let message =
                                format!("Stack deployment aborted: {}, falling back", e);
                            self.reporter.error(&message);
                            summary.warn(message);
                        }
                    }
                }
                None => {
                    self.reporter
                        .warn("No management UI credentials available, falling back");
                }
            }
        }

        if let Some(compose) = bundle.compose_file() {
            self.reporter.info("Starting services from docker-compose.yml");
            match self.runtime.compose_up(&compose).await {
                Ok(()) => {
                    self.reporter.success("Compose services started");
                    return BTreeSet::new();
                }
                Err(e) => {
                    let message = format!("compose up failed: {:#}", e);
                    self.reporter.error(&message);
                    summary.warn(message);
                }
            }
        }

        self.start_containers(records, summary).await;
        BTreeSet::new()
    }

    async fn deploy_stacks(
        &self,
        api: &dyn ManagementApi,
        credentials: &Credentials,
        bundle: &BackupBundle,
        records: &[&ContainerRecord],
        plan: &RestorePlan,
        summary: &mut RestoreSummary,
    ) -> Result<BTreeSet<String>> {
        let dispatcher = self.dispatcher();
        let sequencer = StackSequencer::new(
            self.runtime.clone(),
            api,
            &self.provisioner,
            &dispatcher,
            self.gate(self.config.readiness.stack_wait()),
            SequencerSettings::from_config(&self.config),
            self.reporter.as_ref(),
        )
        .with_platform(self.platform.as_deref());

        let report = sequencer
            .run(credentials, bundle, records, !plan.skip_databases)
            .await?;

        summary.stacks_deployed += report.deployed.len();
        summary.stacks_failed += report.failed.len();
        for name in &report.failed {
            summary.warn(format!("Stack {} failed to deploy", name));
        }

        let tally = report.databases;
        summary.databases_restored += tally.restored;
        summary.databases_failed += tally.failed;
        summary.databases_skipped += tally.skipped;
        summary.warnings.extend(tally.warnings);

        Ok(report.attempted)
    }

    async fn resolve_credentials(&self) -> Option<Credentials> {
        let provider = self.credentials.as_ref()?;
        match provider.resolve().await {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!("Resolving credentials from {} failed: {:#}", provider.name(), e);
                None
            }
        }
    }

    /// Start every selected container present on the host
    async fn start_containers(&self, records: &[&ContainerRecord], summary: &mut RestoreSummary) {
        for record in records {
            match self.runtime.inspect_health(&record.name).await {
                Ok(health) if !health.exists => {
                    let message = format!("Container {} does not exist on this host", record.name);
                    self.reporter.warn(&message);
                    summary.warn(message);
                }
                Ok(health) if health.running => {
                    self.reporter
                        .info(&format!("{} is already running", record.name));
                }
                Ok(_) => match self.runtime.start_container(&record.name).await {
                    Ok(()) => self.reporter.success(&format!("Started {}", record.name)),
                    Err(e) => {
                        let message = format!("Could not start {}: {:#}", record.name, e);
                        self.reporter.error(&message);
                        summary.warn(message);
                    }
                },
                Err(e) => {
                    let message = format!("Could not inspect {}: {:#}", record.name, e);
                    self.reporter.error(&message);
                    summary.warn(message);
                }
            }
        }
    }
}
