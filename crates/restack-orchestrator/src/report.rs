//! Operator-facing progress reporting
//!
//! The orchestrator never prints. It hands every user-visible event to a
//! [`Reporter`], which the binary renders to the terminal and tests record.

use crate::summary::RestoreSummary;
use restack_backup::{BackupManifest, ContainerStatus, RestorePlan};
use std::sync::Mutex;

/// One container line in a dry-run listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRunEntry {
    pub name: String,
    pub image: String,
    pub status: ContainerStatus,
    pub volumes: usize,
    pub database: Option<String>,
}

/// Everything a dry run shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRunReport {
    pub backup_id: String,
    pub backup_name: String,
    pub created_at: Option<String>,
    pub hostname: Option<String>,
    pub total_containers: usize,
    pub networks: Vec<String>,
    pub management_ui_included: bool,
    pub containers: Vec<DryRunEntry>,
    pub skipped_phases: Vec<&'static str>,
}

impl DryRunReport {
    pub fn new(manifest: &BackupManifest, plan: &RestorePlan) -> Self {
        let containers = restack_backup::filter_containers(manifest, plan.filter())
            .into_iter()
            .map(|c| DryRunEntry {
                name: c.name.clone(),
                image: c.image.clone(),
                status: c.status,
                volumes: c.volume_files.len(),
                database: c.database.as_ref().map(|d| d.engine.clone()),
            })
            .collect();

        let mut skipped_phases = Vec::new();
        if plan.skip_management_ui {
            skipped_phases.push("management-ui");
        }
        if plan.skip_networks {
            skipped_phases.push("networks");
        }
        if plan.skip_compose {
            skipped_phases.push("services");
        }
        if plan.skip_databases {
            skipped_phases.push("databases");
        }

        Self {
            backup_id: manifest.id.clone(),
            backup_name: manifest.name.clone(),
            created_at: manifest.created_at.map(|t| t.to_rfc3339()),
            hostname: manifest.hostname.clone(),
            total_containers: manifest.summary.total_containers,
            networks: manifest.networks.iter().map(|n| n.name.clone()).collect(),
            management_ui_included: manifest.management_ui_backup_included,
            containers,
            skipped_phases,
        }
    }
}

/// Receives progress events from a restore run
pub trait Reporter: Send + Sync {
    /// A new phase begins
    fn phase(&self, title: &str);

    fn info(&self, message: &str);

    fn success(&self, message: &str);

    fn warn(&self, message: &str);

    fn error(&self, message: &str);

    fn dry_run(&self, report: &DryRunReport);

    fn summary(&self, summary: &RestoreSummary);
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn phase(&self, title: &str) {
        tracing::info!("== {} ==", title);
    }

    fn info(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn success(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!("{}", message);
    }

    fn dry_run(&self, report: &DryRunReport) {
        tracing::info!(
            "Backup {} ({}): {} container(s)",
            report.backup_id,
            report.backup_name,
            report.total_containers
        );
        for entry in &report.containers {
            tracing::info!("  {} [{}]", entry.name, entry.image);
        }
    }

    fn summary(&self, summary: &RestoreSummary) {
        for line in summary.lines() {
            tracing::info!("{}", line);
        }
    }
}

/// Severity of a recorded event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Phase,
    Info,
    Success,
    Warn,
    Error,
    DryRun,
    Summary,
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct MemoryReporter {
    events: Mutex<Vec<(EventKind, String)>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, kind: EventKind, message: impl Into<String>) {
        if let Ok(mut events) = self.events.lock() {
            events.push((kind, message.into()));
        }
    }

    pub fn events(&self) -> Vec<(EventKind, String)> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn messages(&self, kind: EventKind) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, m)| m)
            .collect()
    }

    /// Whether any event of any kind contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.events().iter().any(|(_, m)| m.contains(needle))
    }
}

impl Reporter for MemoryReporter {
    fn phase(&self, title: &str) {
        self.push(EventKind::Phase, title);
    }

    fn info(&self, message: &str) {
        self.push(EventKind::Info, message);
    }

    fn success(&self, message: &str) {
        self.push(EventKind::Success, message);
    }

    fn warn(&self, message: &str) {
        self.push(EventKind::Warn, message);
    }

    fn error(&self, message: &str) {
        self.push(EventKind::Error, message);
    }

    fn dry_run(&self, report: &DryRunReport) {
        self.push(
            EventKind::DryRun,
            format!("{} {} {}", report.backup_id, report.backup_name, report.total_containers),
        );
        for entry in &report.containers {
            self.push(EventKind::DryRun, format!("{} {}", entry.name, entry.image));
        }
    }

    fn summary(&self, summary: &RestoreSummary) {
        for line in summary.lines() {
            self.push(EventKind::Summary, line);
        }
    }
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn phase(&self, title: &str) {
        (**self).phase(title)
    }

    fn info(&self, message: &str) {
        (**self).info(message)
    }

    fn success(&self, message: &str) {
        (**self).success(message)
    }

    fn warn(&self, message: &str) {
        (**self).warn(message)
    }

    fn error(&self, message: &str) {
        (**self).error(message)
    }

    fn dry_run(&self, report: &DryRunReport) {
        (**self).dry_run(report)
    }

    fn summary(&self, summary: &RestoreSummary) {
        (**self).summary(summary)
    }
}
