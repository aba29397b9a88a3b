//! Network and volume provisioning
//!
//! Ensure-operations are idempotent: an existing network or volume is left
//! untouched and reported as such. Volume restore is not: it empties the
//! volume before unpacking the archive into it.

use camino::Utf8Path;
use restack_backup::{BackupBundle, ContainerRecord, NetworkRecord};
use restack_core::{Error, Result};
use restack_providers::{ContainerRuntime, EphemeralSpec};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What `ensure_network` / `ensure_volume` found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    Created,
    AlreadyExists,
}

/// Per-container volume restore results
#[derive(Debug, Default)]
pub struct VolumeTally {
    pub restored: usize,
    pub failed: usize,
    pub errors: Vec<Error>,
}

pub struct Provisioner {
    runtime: Arc<dyn ContainerRuntime>,
    helper_image: String,
}

impl Provisioner {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, helper_image: impl Into<String>) -> Self {
        Self {
            runtime,
            helper_image: helper_image.into(),
        }
    }

    pub async fn ensure_network(&self, record: &NetworkRecord) -> Result<Provisioned> {
        let exists = self
            .runtime
            .network_exists(&record.name)
            .await
            .map_err(|e| resource_err(&record.name, e))?;

        if exists {
            info!("Network {} already exists", record.name);
            return Ok(Provisioned::AlreadyExists);
        }

        if record.external {
            warn!(
                "External network {} is missing on this host, creating it",
                record.name
            );
        }

        self.runtime
            .create_network(&record.name, &record.driver)
            .await
            .map_err(|e| resource_err(&record.name, e))?;
        info!("Created network {} ({})", record.name, record.driver);
        Ok(Provisioned::Created)
    }

    pub async fn ensure_volume(&self, name: &str) -> Result<Provisioned> {
        let exists = self
            .runtime
            .volume_exists(name)
            .await
            .map_err(|e| resource_err(name, e))?;

        if exists {
            debug!("Volume {} already exists", name);
            return Ok(Provisioned::AlreadyExists);
        }

        self.runtime
            .create_volume(name)
            .await
            .map_err(|e| resource_err(name, e))?;
        info!("Created volume {}", name);
        Ok(Provisioned::Created)
    }

    /// Replace the contents of volume `name` with `archive`
    ///
    /// Anything already in the volume is deleted first.
    pub async fn restore_volume(&self, name: &str, archive: &Utf8Path) -> Result<()> {
        if !archive.is_file() {
            return Err(Error::resource(
                name,
                format!("archive {} does not exist", archive),
            ));
        }

        let (dir, file) = match (archive.parent(), archive.file_name()) {
            (Some(dir), Some(file)) => (dir, file),
            _ => {
                return Err(Error::resource(
                    name,
                    format!("invalid archive path {}", archive),
                ))
            }
        };

        self.ensure_volume(name).await?;

        warn!(
            "Overwriting volume {}: existing contents will be deleted",
            name
        );

        let spec = EphemeralSpec {
            image: self.helper_image.clone(),
            mounts: vec![
                (name.to_string(), "/data".to_string(), false),
                (dir.to_string(), "/backup".to_string(), true),
            ],
            script: restore_script(file),
        };

        let output = self
            .runtime
            .run_ephemeral(&spec)
            .await
            .map_err(|e| resource_err(name, e))?;

        if !output.success() {
            return Err(Error::resource(
                name,
                format!(
                    "extraction exited with {}: {}",
                    output.code,
                    output.stderr.trim()
                ),
            ));
        }

        info!("Restored volume {} from {}", name, file);
        Ok(())
    }

    /// Restore every volume archive of one container, continuing past failures
    pub async fn restore_container_volumes(
        &self,
        bundle: &BackupBundle,
        record: &ContainerRecord,
    ) -> VolumeTally {
        let mut tally = VolumeTally::default();

        for (volume, file) in record.volumes() {
            let archive = bundle.data_file(&record.name, file);
            match self.restore_volume(&volume, &archive).await {
                Ok(()) => tally.restored += 1,
                Err(e) => {
                    warn!("{}", e);
                    tally.failed += 1;
                    tally.errors.push(e);
                }
            }
        }

        tally
    }
}

fn resource_err(resource: &str, err: anyhow::Error) -> Error {
    Error::resource(resource, format!("{:#}", err))
}

/// Shell script run in the helper container: clear `/data`, unpack into it
pub fn restore_script(file: &str) -> String {
    let source = format!("/backup/{}", file);
    let quoted = shell_quote(&source);

    let extract = if file.ends_with(".tar.zst") {
        format!(
            "(command -v zstd >/dev/null || apk add --no-cache zstd >/dev/null) && zstd -dc {} | tar -xf - -C /data",
            quoted
        )
    } else if file.ends_with(".tar") {
        format!("tar -xf {} -C /data", quoted)
    } else {
        format!("tar -xzf {} -C /data", quoted)
    };

    format!("find /data -mindepth 1 -delete && {}", extract)
}

pub(crate) fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_script_clears_before_extracting() {
        let script = restore_script("pgdata.tar.gz");
        assert_eq!(
            script,
            "find /data -mindepth 1 -delete && tar -xzf '/backup/pgdata.tar.gz' -C /data"
        );
    }

    #[test]
    fn test_restore_script_by_suffix() {
        assert!(restore_script("v.tar").contains("tar -xf '/backup/v.tar'"));
        assert!(restore_script("v.tgz").contains("tar -xzf"));
        assert!(restore_script("v.tar.zst").contains("zstd -dc '/backup/v.tar.zst'"));
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("a'b"), r"'a'\''b'");
    }
}
