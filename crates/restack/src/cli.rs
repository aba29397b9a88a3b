//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::Parser;
use restack_backup::RestorePlan;

/// Restack - restore a docker host from a backup archive
#[derive(Parser, Debug)]
#[command(name = "restack")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Backup archive (.tar.gz) to restore from
    pub archive: Utf8PathBuf,

    /// Do not create networks
    #[arg(long)]
    pub skip_networks: bool,

    /// Do not restore databases
    #[arg(long)]
    pub skip_databases: bool,

    /// Do not deploy stacks or start services
    #[arg(long)]
    pub skip_compose: bool,

    /// Do not restore the management UI's own data
    #[arg(long)]
    pub skip_management_ui: bool,

    /// Show what the backup contains without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Restrict the restore to the container with this exact name
    #[arg(short = 'C', long, value_name = "NAME")]
    pub container: Option<String>,

    /// Management UI credentials file (username/password)
    #[arg(long, env = "RESTACK_CREDENTIALS_FILE", value_name = "PATH")]
    pub credentials_file: Option<Utf8PathBuf>,

    /// Never prompt for credentials
    #[arg(long)]
    pub no_prompt: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only print warnings, errors and the summary
    #[arg(short, long)]
    pub quiet: bool,

    /// Path to restack.yaml config file
    #[arg(short, long)]
    pub config: Option<Utf8PathBuf>,
}

impl Cli {
    pub fn plan(&self) -> RestorePlan {
        RestorePlan {
            skip_networks: self.skip_networks,
            skip_databases: self.skip_databases,
            skip_compose: self.skip_compose,
            skip_management_ui: self.skip_management_ui,
            dry_run: self.dry_run,
            container_filter: self.container.clone().filter(|c| !c.is_empty()),
        }
    }
}
