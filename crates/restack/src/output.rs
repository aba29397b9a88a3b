//! Terminal output utilities

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use restack_orchestrator::{DryRunReport, Reporter, RestoreSummary};
use std::sync::Mutex;
use tabled::{settings::Style, Table, Tabled};

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", style("✗").red().bold(), msg);
}

/// Print a warning message
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("⚠").yellow().bold(), msg);
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Print a header
pub fn header(msg: &str) {
    println!("\n{}", style(msg).bold().underlined());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", style(key).dim(), value);
}

/// Create a spinner
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(template.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

#[derive(Tabled)]
struct ContainerRow {
    name: String,
    image: String,
    status: String,
    volumes: usize,
    database: String,
}

/// Container listing for a dry run
pub fn dry_run_table(report: &DryRunReport) -> String {
    let rows: Vec<ContainerRow> = report
        .containers
        .iter()
        .map(|entry| ContainerRow {
            name: entry.name.clone(),
            image: entry.image.clone(),
            status: entry.status.to_string(),
            volumes: entry.volumes,
            database: entry.database.clone().unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::sharp());
    table.to_string()
}

/// Renders orchestrator progress on the terminal
///
/// Each phase gets a spinner; messages are printed above it.
pub struct ConsoleReporter {
    quiet: bool,
    spinner: Mutex<Option<ProgressBar>>,
}

impl ConsoleReporter {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            spinner: Mutex::new(None),
        }
    }

    fn finish_spinner(&self) {
        if let Ok(mut current) = self.spinner.lock() {
            if let Some(pb) = current.take() {
                pb.finish_and_clear();
            }
        }
    }

    /// Print without tearing the spinner
    fn print(&self, print: impl FnOnce()) {
        match self.spinner.lock() {
            Ok(current) => match current.as_ref() {
                Some(pb) => pb.suspend(print),
                None => print(),
            },
            Err(_) => print(),
        }
    }
}

impl Reporter for ConsoleReporter {
    fn phase(&self, title: &str) {
        self.finish_spinner();
        if self.quiet {
            return;
        }
        header(title);
        if let Ok(mut current) = self.spinner.lock() {
            *current = Some(spinner(title));
        }
    }

    fn info(&self, message: &str) {
        if !self.quiet {
            self.print(|| info(message));
        }
    }

    fn success(&self, message: &str) {
        if !self.quiet {
            self.print(|| success(message));
        }
    }

    fn warn(&self, message: &str) {
        self.print(|| warning(message));
    }

    fn error(&self, message: &str) {
        self.print(|| error(message));
    }

    fn dry_run(&self, report: &DryRunReport) {
        self.finish_spinner();
        kv("Backup", &report.backup_id);
        kv("Name", &report.backup_name);
        if let Some(created) = &report.created_at {
            kv("Created", created);
        }
        if let Some(host) = &report.hostname {
            kv("Host", host);
        }
        kv("Containers", &report.total_containers.to_string());
        if !report.networks.is_empty() {
            kv("Networks", &report.networks.join(", "));
        }
        kv(
            "Management UI backup",
            if report.management_ui_included { "yes" } else { "no" },
        );
        if !report.skipped_phases.is_empty() {
            kv("Skipped phases", &report.skipped_phases.join(", "));
        }
        println!("\n{}", dry_run_table(report));
    }

    fn summary(&self, summary: &RestoreSummary) {
        self.finish_spinner();
        for line in summary.lines() {
            kv("•", &line);
        }
        println!();
        if summary.dry_run {
            info("Remove --dry-run to perform the restore");
        } else if summary.is_degraded() {
            warning(&format!(
                "Restore of {} completed with {} warning(s)",
                summary.backup_id,
                summary.warnings.len()
            ));
        } else {
            success(&format!("Restore of {} complete", summary.backup_id));
        }
    }
}
