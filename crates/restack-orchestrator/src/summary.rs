//! Final restore summary

use std::fmt;

/// Counts gathered across every phase of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub backup_id: String,
    pub backup_name: String,
    pub dry_run: bool,

    pub networks_created: usize,
    pub networks_existing: usize,
    pub networks_failed: usize,

    pub volumes_restored: usize,
    pub volumes_failed: usize,

    /// Containers left alone: failed at backup time or outside the filter
    pub containers_skipped: usize,

    pub stacks_deployed: usize,
    pub stacks_failed: usize,

    pub databases_restored: usize,
    pub databases_failed: usize,
    pub databases_skipped: usize,

    pub warnings: Vec<String>,
}

impl RestoreSummary {
    pub fn new(backup_id: impl Into<String>, backup_name: impl Into<String>) -> Self {
        Self {
            backup_id: backup_id.into(),
            backup_name: backup_name.into(),
            ..Default::default()
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Anything failed or was skipped with a warning
    pub fn is_degraded(&self) -> bool {
        self.networks_failed > 0
            || self.volumes_failed > 0
            || self.stacks_failed > 0
            || self.databases_failed > 0
            || !self.warnings.is_empty()
    }

    /// Human-readable lines, in display order
    pub fn lines(&self) -> Vec<String> {
        if self.dry_run {
            return vec![format!(
                "Dry run of backup {} complete, nothing was changed",
                self.backup_id
            )];
        }

        vec![
            format!(
                "Networks: {} created, {} already present, {} failed",
                self.networks_created, self.networks_existing, self.networks_failed
            ),
            format!(
                "Volumes: {} restored, {} failed",
                self.volumes_restored, self.volumes_failed
            ),
            format!("Containers skipped: {}", self.containers_skipped),
            format!(
                "Stacks: {} deployed, {} failed",
                self.stacks_deployed, self.stacks_failed
            ),
            format!("Restored {} database(s)", self.databases_restored),
            format!(
                "Databases: {} failed, {} skipped",
                self.databases_failed, self.databases_skipped
            ),
            format!("Warnings: {}", self.warnings.len()),
        ]
    }
}

impl fmt::Display for RestoreSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_line() {
        let summary = RestoreSummary {
            databases_restored: 1,
            ..RestoreSummary::new("b1", "nightly")
        };
        assert!(summary.lines().contains(&"Restored 1 database(s)".to_string()));
        assert!(!summary.is_degraded());
    }

    #[test]
    fn test_degraded_on_failure_or_warning() {
        let mut summary = RestoreSummary::new("b1", "nightly");
        summary.volumes_failed = 1;
        assert!(summary.is_degraded());

        let mut summary = RestoreSummary::new("b1", "nightly");
        summary.warn("data/argos missing");
        assert!(summary.is_degraded());
    }

    #[test]
    fn test_dry_run_summary() {
        let summary = RestoreSummary {
            dry_run: true,
            ..RestoreSummary::new("b1", "nightly")
        };
        assert_eq!(summary.lines().len(), 1);
        assert!(summary.to_string().contains("nothing was changed"));
    }
}
