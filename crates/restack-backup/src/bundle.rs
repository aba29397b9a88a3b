//! Backup bundle extraction.
//!
//! A bundle is a `.tar.gz` holding `manifest.json`, a `data/<container>/`
//! tree with volume archives and database dumps, and optionally a compose
//! file and the management UI's state archive. It is unpacked into a
//! temporary directory that is deleted when the [`BackupBundle`] drops.

use crate::manifest::{BackupManifest, ManifestError, MANIFEST_FILENAME};
use camino::{Utf8Path, Utf8PathBuf};
use flate2::read::GzDecoder;
use std::fs::File;
use std::path::{Component, Path};
use tar::Archive;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info};

/// Compose file recreating the deployment.
pub const COMPOSE_FILENAME: &str = "docker-compose.yml";

/// Management UI state archive, relative to the bundle root.
pub const MANAGEMENT_UI_ARCHIVE: &str = "portainer/portainer_data.tar.gz";

/// Directory holding per-container data, relative to the bundle root.
pub const DATA_DIR: &str = "data";

/// Errors raised before the manifest can be read. All of them are fatal.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("Backup archive not found: {0}")]
    NotFound(Utf8PathBuf),

    #[error("Backup archive is not a regular file: {0}")]
    NotAFile(Utf8PathBuf),

    #[error("Failed to extract {path}: {source}")]
    Extract {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive entry escapes the extraction directory: {0}")]
    UnsafeEntry(String),

    #[error("No manifest.json found in backup archive")]
    ManifestMissing,

    #[error("Temporary directory path is not UTF-8")]
    NonUtf8TempDir,
}

impl From<BundleError> for restack_core::Error {
    fn from(err: BundleError) -> Self {
        restack_core::Error::fatal_input(err.to_string())
    }
}

/// Check that `path` names a readable regular file.
pub fn validate_input(path: &Utf8Path) -> Result<(), BundleError> {
    if !path.exists() {
        return Err(BundleError::NotFound(path.to_owned()));
    }
    if !path.is_file() {
        return Err(BundleError::NotAFile(path.to_owned()));
    }
    File::open(path).map_err(|source| BundleError::Extract {
        path: path.to_owned(),
        source,
    })?;
    debug!("✓ Backup archive is readable: {}", path);
    Ok(())
}

/// An extracted backup bundle.
#[derive(Debug)]
pub struct BackupBundle {
    // Held for its Drop: removes the extraction directory.
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl BackupBundle {
    /// Extract `archive` into a fresh temporary directory.
    pub fn extract(archive: &Utf8Path) -> Result<Self, BundleError> {
        validate_input(archive)?;

        let dir = tempfile::Builder::new()
            .prefix("restack-")
            .tempdir()
            .map_err(|source| BundleError::Extract {
                path: archive.to_owned(),
                source,
            })?;
        let base = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .map_err(|_| BundleError::NonUtf8TempDir)?;

        info!("Extracting {} to {}", archive, base);
        unpack(archive, &base)?;

        let root = locate_root(&base).ok_or(BundleError::ManifestMissing)?;
        debug!("Bundle root: {}", root);

        Ok(Self { _dir: dir, root })
    }

    /// Directory containing `manifest.json`.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn manifest_path(&self) -> Utf8PathBuf {
        self.root.join(MANIFEST_FILENAME)
    }

    pub fn load_manifest(&self) -> Result<BackupManifest, ManifestError> {
        BackupManifest::parse(&self.manifest_path())
    }

    /// `data/<container>/`
    pub fn data_dir(&self, container: &str) -> Utf8PathBuf {
        self.root.join(DATA_DIR).join(container)
    }

    /// A file under `data/<container>/`, present or not.
    pub fn data_file(&self, container: &str, file: &str) -> Utf8PathBuf {
        self.data_dir(container).join(file)
    }

    pub fn compose_file(&self) -> Option<Utf8PathBuf> {
        let path = self.root.join(COMPOSE_FILENAME);
        path.is_file().then_some(path)
    }

    pub fn management_ui_archive(&self) -> Option<Utf8PathBuf> {
        let path = self.root.join(MANAGEMENT_UI_ARCHIVE);
        path.is_file().then_some(path)
    }

    /// Successful containers whose `data/<name>/` directory is absent.
    pub fn missing_data_paths(&self, manifest: &BackupManifest) -> Vec<String> {
        manifest
            .successful()
            .filter(|c| !self.data_dir(&c.name).is_dir())
            .map(|c| c.name.clone())
            .collect()
    }
}

fn unpack(archive: &Utf8Path, dest: &Utf8Path) -> Result<(), BundleError> {
    let extract_err = |source| BundleError::Extract {
        path: archive.to_owned(),
        source,
    };

    let file = File::open(archive).map_err(extract_err)?;
    let mut tar = Archive::new(GzDecoder::new(file));

    for entry in tar.entries().map_err(extract_err)? {
        let mut entry = entry.map_err(extract_err)?;
        let path = entry.path().map_err(extract_err)?.into_owned();

        if !is_safe_entry(&path) {
            return Err(BundleError::UnsafeEntry(path.display().to_string()));
        }

        entry.unpack_in(dest).map_err(extract_err)?;
    }

    Ok(())
}

fn is_safe_entry(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// The extraction dir itself, or its single level-one subdirectory, whichever holds the manifest.
fn locate_root(base: &Utf8Path) -> Option<Utf8PathBuf> {
    if base.join(MANIFEST_FILENAME).is_file() {
        return Some(base.to_owned());
    }

    base.read_dir_utf8()
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.into_path())
        .filter(|path| path.is_dir())
        .find(|path| path.join(MANIFEST_FILENAME).is_file())
}
