//! Backup manifest format.
//!
//! `manifest.json` describes every container captured by a backup, the
//! networks they were attached to, and whether the management UI's own state
//! was archived alongside. It is parsed once per run and never mutated.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Name of the manifest file inside a backup bundle.
pub const MANIFEST_FILENAME: &str = "manifest.json";

/// Suffixes stripped from a volume archive filename to get the volume name.
const VOLUME_ARCHIVE_SUFFIXES: &[&str] = &[".tar.gz", ".tgz", ".tar.zst", ".tar"];

/// Errors raised while reading a manifest. All of them are fatal to a run.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Manifest not found: {path}")]
    NotFound { path: Utf8PathBuf },

    #[error("Failed to read manifest {path}: {source}")]
    Unreadable {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed manifest {path}: {source}")]
    Malformed {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Manifest is missing required field '{field}'")]
    MissingField { field: &'static str },

    #[error("Manifest lists no containers")]
    NoContainers,
}

impl From<ManifestError> for restack_core::Error {
    fn from(err: ManifestError) -> Self {
        restack_core::Error::fatal_input(err.to_string())
    }
}

/// Complete backup manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupManifest {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    pub summary: BackupSummary,

    #[serde(default)]
    pub containers: Vec<ContainerRecord>,

    #[serde(default)]
    pub networks: Vec<NetworkRecord>,

    /// Whether the management UI's data volume was archived too
    #[serde(default, alias = "portainerBackupIncluded")]
    pub management_ui_backup_included: bool,
}

/// Counts recorded at backup time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSummary {
    pub total_containers: usize,

    #[serde(default)]
    pub successful: usize,

    #[serde(default)]
    pub failed: usize,
}

/// One captured service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRecord {
    pub name: String,

    #[serde(default)]
    pub image: String,

    pub status: ContainerStatus,

    /// Volume archives under `data/<name>/`, in restore order
    #[serde(default)]
    pub volume_files: Vec<String>,

    #[serde(
        default,
        alias = "databaseDescriptor",
        skip_serializing_if = "Option::is_none"
    )]
    pub database: Option<DatabaseDescriptor>,

    /// Stack (compose project) the container belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ContainerRecord {
    pub fn is_success(&self) -> bool {
        self.status == ContainerStatus::Success
    }

    /// `(volume name, archive filename)` for every volume file
    pub fn volumes(&self) -> impl Iterator<Item = (String, &str)> + '_ {
        self.volume_files
            .iter()
            .map(|file| (volume_name_from_archive(file), file.as_str()))
    }
}

/// Outcome of capturing a container at backup time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Success,
    Failed,
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// How to restore a container's database.
///
/// The engine stays a string so a manifest naming an engine this tool does
/// not know still parses; the restore phase reports it and moves on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseDescriptor {
    #[serde(alias = "type")]
    pub engine: String,

    pub dump_file: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

impl DatabaseDescriptor {
    pub fn engine(&self) -> Result<DatabaseEngine, UnknownEngine> {
        self.engine.parse()
    }
}

/// Database engines with a restore strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseEngine {
    Postgres,
    MySql,
    MariaDb,
    MongoDb,
}

impl DatabaseEngine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::MariaDb => "mariadb",
            Self::MongoDb => "mongodb",
        }
    }
}

impl fmt::Display for DatabaseEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine name with no restore strategy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown database engine '{0}'")]
pub struct UnknownEngine(pub String);

impl FromStr for DatabaseEngine {
    type Err = UnknownEngine;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" => Ok(Self::MySql),
            "mariadb" => Ok(Self::MariaDb),
            "mongodb" | "mongo" => Ok(Self::MongoDb),
            _ => Err(UnknownEngine(s.to_string())),
        }
    }
}

/// A network the backed-up containers were attached to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRecord {
    pub name: String,

    #[serde(default = "default_driver")]
    pub driver: String,

    /// Expected to pre-exist on the host
    #[serde(default)]
    pub external: bool,
}

fn default_driver() -> String {
    "bridge".to_string()
}

impl BackupManifest {
    /// Parse `manifest.json` at `path`.
    pub fn parse(path: &Utf8Path) -> Result<Self, ManifestError> {
        if !path.exists() {
            return Err(ManifestError::NotFound {
                path: path.to_owned(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Unreadable {
            path: path.to_owned(),
            source,
        })?;

        Self::from_json(&content).map_err(|err| match err {
            ManifestError::Malformed { source, .. } => ManifestError::Malformed {
                path: path.to_owned(),
                source,
            },
            other => other,
        })
    }

    /// Parse a manifest from its JSON text.
    pub fn from_json(content: &str) -> Result<Self, ManifestError> {
        let malformed = |source| ManifestError::Malformed {
            path: Utf8PathBuf::from(MANIFEST_FILENAME),
            source,
        };

        let value: serde_json::Value = serde_json::from_str(content).map_err(malformed)?;

        if value.get("id").and_then(|v| v.as_str()).is_none() {
            return Err(ManifestError::MissingField { field: "id" });
        }
        if value
            .get("summary")
            .and_then(|s| s.get("totalContainers"))
            .and_then(|v| v.as_u64())
            .is_none()
        {
            return Err(ManifestError::MissingField {
                field: "summary.totalContainers",
            });
        }

        let manifest: BackupManifest = serde_json::from_value(value).map_err(malformed)?;

        if manifest.containers.is_empty() {
            return Err(ManifestError::NoContainers);
        }

        Ok(manifest)
    }

    pub fn successful(&self) -> impl Iterator<Item = &ContainerRecord> {
        self.containers.iter().filter(|c| c.is_success())
    }

    pub fn container(&self, name: &str) -> Option<&ContainerRecord> {
        self.containers.iter().find(|c| c.name == name)
    }
}

/// All containers when `filter` is empty, else the exact-name match.
///
/// An empty result is not an error.
pub fn filter_containers<'a>(
    manifest: &'a BackupManifest,
    filter: Option<&str>,
) -> Vec<&'a ContainerRecord> {
    match filter.filter(|f| !f.is_empty()) {
        None => manifest.containers.iter().collect(),
        Some(name) => manifest
            .containers
            .iter()
            .filter(|c| c.name == name)
            .collect(),
    }
}

/// Volume name for an archive file: the filename minus its archive suffix.
pub fn volume_name_from_archive(file: &str) -> String {
    let base = file.rsplit('/').next().unwrap_or(file);
    VOLUME_ARCHIVE_SUFFIXES
        .iter()
        .find_map(|suffix| base.strip_suffix(suffix))
        .unwrap_or(base)
        .to_string()
}
