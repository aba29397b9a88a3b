//! Docker CLI runtime

use crate::traits::{
    ContainerHealth, ContainerRuntime, EphemeralSpec, ExecInput, ExecOutput, HealthStatus,
};
use crate::utils::command_exists;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use camino::Utf8Path;
use std::process::{Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Runs every operation through the `docker` CLI
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    bin: String,
}

impl DockerRuntime {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    /// Whether the docker binary is on PATH
    pub fn is_available(&self) -> bool {
        command_exists(&self.bin)
    }

    pub fn bin(&self) -> &str {
        &self.bin
    }

    async fn docker(&self, args: &[&str]) -> Result<Output> {
        debug!("{} {}", self.bin, args.join(" "));
        Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to run {} {}", self.bin, args.join(" ")))
    }

    /// Run and fail on non-zero exit, with stderr in the error
    async fn docker_ok(&self, args: &[&str]) -> Result<Output> {
        let output = self.docker(args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "{} {} failed: {}",
                self.bin,
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            ));
        }
        Ok(output)
    }
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new("docker")
    }
}

fn to_exec_output(output: Output) -> ExecOutput {
    ExecOutput {
        code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }
}

/// Parse `{{.State.Status}}|{{.State.Health.Status}}`
fn parse_inspect(line: &str) -> ContainerHealth {
    let mut parts = line.trim().splitn(2, '|');
    let state = parts.next().unwrap_or_default().trim();
    let health = match parts.next().unwrap_or_default().trim() {
        "healthy" => Some(HealthStatus::Healthy),
        "unhealthy" => Some(HealthStatus::Unhealthy),
        "starting" => Some(HealthStatus::Starting),
        _ => None,
    };

    ContainerHealth {
        exists: true,
        running: state == "running",
        health,
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn network_exists(&self, name: &str) -> Result<bool> {
        Ok(self
            .docker(&["network", "inspect", name])
            .await?
            .status
            .success())
    }

    async fn create_network(&self, name: &str, driver: &str) -> Result<()> {
        self.docker_ok(&["network", "create", "--driver", driver, name])
            .await?;
        Ok(())
    }

    async fn volume_exists(&self, name: &str) -> Result<bool> {
        Ok(self
            .docker(&["volume", "inspect", name])
            .await?
            .status
            .success())
    }

    async fn create_volume(&self, name: &str) -> Result<()> {
        self.docker_ok(&["volume", "create", name]).await?;
        Ok(())
    }

    async fn inspect_health(&self, container: &str) -> Result<ContainerHealth> {
        let output = self
            .docker(&[
                "inspect",
                "-f",
                "{{.State.Status}}|{{if .State.Health}}{{.State.Health.Status}}{{end}}",
                container,
            ])
            .await?;

        if !output.status.success() {
            return Ok(ContainerHealth::missing());
        }

        Ok(parse_inspect(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn start_container(&self, container: &str) -> Result<()> {
        self.docker_ok(&["start", container]).await?;
        Ok(())
    }

    async fn stop_container(&self, container: &str) -> Result<()> {
        self.docker_ok(&["stop", container]).await?;
        Ok(())
    }

    async fn exec_in(
        &self,
        container: &str,
        command: &[String],
        input: ExecInput,
    ) -> Result<ExecOutput> {
        let mut args: Vec<&str> = vec!["exec"];
        if matches!(input, ExecInput::File(_)) {
            args.push("-i");
        }
        args.push(container);
        args.extend(command.iter().map(String::as_str));

        let ExecInput::File(path) = input else {
            return Ok(to_exec_output(self.docker(&args).await?));
        };

        debug!("{} {} < {}", self.bin, args.join(" "), path);
        let mut child = Command::new(&self.bin)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to run {} exec in {}", self.bin, container))?;

        let mut source = tokio::fs::File::open(&path)
            .await
            .with_context(|| format!("Failed to open {}", path))?;
        if let Some(mut stdin) = child.stdin.take() {
            tokio::io::copy(&mut source, &mut stdin)
                .await
                .with_context(|| format!("Failed to stream {} into {}", path, container))?;
            stdin.shutdown().await?;
        }

        Ok(to_exec_output(child.wait_with_output().await?))
    }

    async fn copy_into(&self, container: &str, host_path: &Utf8Path, dest: &str) -> Result<()> {
        let target = format!("{}:{}", container, dest);
        self.docker_ok(&["cp", host_path.as_str(), &target]).await?;
        Ok(())
    }

    async fn run_ephemeral(&self, spec: &EphemeralSpec) -> Result<ExecOutput> {
        let mounts: Vec<String> = spec
            .mounts
            .iter()
            .map(|(source, target, read_only)| {
                if *read_only {
                    format!("{}:{}:ro", source, target)
                } else {
                    format!("{}:{}", source, target)
                }
            })
            .collect();

        let mut args: Vec<&str> = vec!["run", "--rm"];
        for mount in &mounts {
            args.push("-v");
            args.push(mount);
        }
        args.extend([spec.image.as_str(), "sh", "-c", spec.script.as_str()]);

        Ok(to_exec_output(self.docker(&args).await?))
    }

    async fn compose_up(&self, file: &Utf8Path) -> Result<()> {
        self.docker_ok(&["compose", "-f", file.as_str(), "up", "-d"])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inspect_with_health() {
        let health = parse_inspect("running|healthy\n");
        assert!(health.exists);
        assert!(health.running);
        assert_eq!(health.health, Some(HealthStatus::Healthy));
    }

    #[test]
    fn test_parse_inspect_without_healthcheck() {
        let health = parse_inspect("running|");
        assert!(health.running);
        assert_eq!(health.health, None);
    }

    #[test]
    fn test_parse_inspect_exited() {
        let health = parse_inspect("exited|unhealthy");
        assert!(health.exists);
        assert!(!health.running);
        assert_eq!(health.health, Some(HealthStatus::Unhealthy));
    }

    #[test]
    fn test_default_binary() {
        assert_eq!(DockerRuntime::default().bin(), "docker");
    }

    #[tokio::test]
    async fn test_missing_binary_is_an_error() {
        let runtime = DockerRuntime::new("restack-no-such-docker");
        assert!(!runtime.is_available());
        assert!(runtime.network_exists("x").await.is_err());
    }
}
