//! Restack backup bundles
//!
//! This crate models what a backup contains and unpacks it for a restore:
//!
//! - **Manifest**: `manifest.json` with containers, networks and database descriptors
//! - **Bundle**: `.tar.gz` extraction into a self-deleting temporary directory
//! - **Plan**: the immutable set of options a restore run follows
//!
//! # Examples
//!
//! ```no_run
//! use camino::Utf8Path;
//! use restack_backup::{filter_containers, BackupBundle};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bundle = BackupBundle::extract(Utf8Path::new("backup.tar.gz"))?;
//!     let manifest = bundle.load_manifest()?;
//!
//!     for container in filter_containers(&manifest, None) {
//!         println!("{} ({})", container.name, container.image);
//!     }
//!     Ok(())
//! }
//! ```

pub mod bundle;
pub mod manifest;
pub mod plan;

pub use bundle::{validate_input, BackupBundle, BundleError, COMPOSE_FILENAME, MANAGEMENT_UI_ARCHIVE};
pub use manifest::{
    filter_containers, volume_name_from_archive, BackupManifest, BackupSummary, ContainerRecord,
    ContainerStatus, DatabaseDescriptor, DatabaseEngine, ManifestError, NetworkRecord,
    UnknownEngine, MANIFEST_FILENAME,
};
pub use plan::RestorePlan;
