//! Restack CLI - phased restore of docker deployments
//!
//! Exit codes: 0 when the restore ran to its summary (even with warnings)
//! or help/version was shown, 1 on unusable input or a bad invocation.

mod cli;
mod credentials;
mod output;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use restack_core::RestackConfig;
use restack_orchestrator::{Orchestrator, RestoreSummary};
use restack_providers::{DockerRuntime, PlatformClient, PortainerClient};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::Cli;
use output::ConsoleReporter;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize rustls crypto provider (required for rustls 0.23+)
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    init_tracing(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<RestoreSummary> {
    // Reject an unusable archive before anything prompts
    restack_backup::validate_input(&cli.archive)?;

    let config = RestackConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    let plan = cli.plan();

    let runtime = DockerRuntime::new(config.runtime.docker_bin.clone());
    if !plan.dry_run && !runtime.is_available() {
        output::warning(&format!(
            "{} not found on PATH, every host operation will fail",
            runtime.bin()
        ));
    }

    let reporter = Arc::new(ConsoleReporter::new(cli.quiet));
    let mut builder = Orchestrator::builder(Arc::new(runtime))
        .config(config.clone())
        .reporter(reporter);

    // Stack deployment needs a management UI session; ask for it now rather
    // than halfway through the restore
    if !plan.dry_run && !plan.skip_compose && plan.filter().is_none() {
        let portainer = PortainerClient::new(
            config.management_ui.url.clone(),
            config.management_ui.accept_invalid_certs,
        )?
        .with_retry(config.retry.clone());
        builder = builder.management_api(Arc::new(portainer));

        let chain = credentials::provider_chain(cli.credentials_file.clone(), !cli.no_prompt);
        let resolved = credentials::resolve_upfront(chain).await;
        builder = builder.credentials(Arc::new(credentials::Resolved(resolved)));

        if let Some(url) = config.platform.url.clone() {
            builder = builder.platform_api(Arc::new(PlatformClient::new(url)?));
        }
    }

    let summary = builder.build().run(&cli.archive, &plan).await?;
    Ok(summary)
}

/// Initialize tracing with appropriate verbosity
///
/// Progress goes through the console reporter, so library logs start at
/// warn; `RUST_LOG` overrides the flags.
fn init_tracing(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
