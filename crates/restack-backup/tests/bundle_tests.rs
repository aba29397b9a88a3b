//! Integration tests for backup bundle extraction

mod common;

use camino::{Utf8Path, Utf8PathBuf};
use common::{temp_dir, two_container_manifest, BundleBuilder};
use restack_backup::{BackupBundle, BundleError, ContainerStatus, ManifestError};

fn utf8(path: std::path::PathBuf) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path).unwrap()
}

// ─── Extraction ──────────────────────────────────────────────────────────────

#[test]
fn test_extract_flat_bundle() {
    let dir = temp_dir();
    let archive = BundleBuilder::new()
        .manifest(two_container_manifest())
        .file("data/alexandria-db/alexandria_pgdata.tar.gz", b"volume")
        .file("data/alexandria-db/alexandria.dump", b"dump")
        .file("docker-compose.yml", b"services: {}\n")
        .write_to(dir.path());

    let bundle = BackupBundle::extract(&utf8(archive)).unwrap();
    let manifest = bundle.load_manifest().unwrap();

    assert_eq!(manifest.id, "backup-e2e");
    assert_eq!(manifest.containers[1].status, ContainerStatus::Failed);
    assert!(bundle
        .data_file("alexandria-db", "alexandria.dump")
        .is_file());
    assert!(bundle.compose_file().is_some());
    assert!(bundle.management_ui_archive().is_none());
    assert!(bundle.missing_data_paths(&manifest).is_empty());
}

#[test]
fn test_manifest_one_level_down() {
    let dir = temp_dir();
    let archive = BundleBuilder::new()
        .nested_in("backup-e2e")
        .manifest(two_container_manifest())
        .file("portainer/portainer_data.tar.gz", b"ui")
        .write_to(dir.path());

    let bundle = BackupBundle::extract(&utf8(archive)).unwrap();

    assert!(bundle.root().ends_with("backup-e2e"));
    assert!(bundle.load_manifest().is_ok());
    assert!(bundle.management_ui_archive().is_some());
}

#[test]
fn test_missing_manifest_is_fatal() {
    let dir = temp_dir();
    let archive = BundleBuilder::new()
        .file("data/x/vol.tar.gz", b"v")
        .write_to(dir.path());

    let err = BackupBundle::extract(&utf8(archive)).unwrap_err();
    assert!(matches!(err, BundleError::ManifestMissing));
    assert!(restack_core::Error::from(err).is_fatal());
}

#[test]
fn test_corrupt_archive_is_fatal() {
    let dir = temp_dir();
    let path = dir.path().join("broken.tar.gz");
    std::fs::write(&path, b"this is not gzip").unwrap();

    let err = BackupBundle::extract(&utf8(path)).unwrap_err();
    assert!(matches!(err, BundleError::Extract { .. }));
}

#[test]
fn test_missing_data_paths_reported() {
    let dir = temp_dir();
    let archive = BundleBuilder::new()
        .manifest(two_container_manifest())
        .write_to(dir.path());

    let bundle = BackupBundle::extract(&utf8(archive)).unwrap();
    let manifest = bundle.load_manifest().unwrap();

    // Only successful containers are expected to carry data
    assert_eq!(bundle.missing_data_paths(&manifest), vec!["alexandria-db"]);
}

#[test]
fn test_malformed_manifest_in_bundle() {
    let dir = temp_dir();
    let archive = BundleBuilder::new()
        .manifest(r#"{"id": "x", "summary": {"totalContainers": "two"}}"#)
        .write_to(dir.path());

    let bundle = BackupBundle::extract(&utf8(archive)).unwrap();
    assert!(matches!(
        bundle.load_manifest().unwrap_err(),
        ManifestError::MissingField { .. }
    ));
}

// ─── Cleanup ─────────────────────────────────────────────────────────────────

#[test]
fn test_extraction_dir_removed_on_drop() {
    let dir = temp_dir();
    let archive = BundleBuilder::new()
        .manifest(two_container_manifest())
        .write_to(dir.path());

    let bundle = BackupBundle::extract(&utf8(archive)).unwrap();
    let root = bundle.root().to_owned();
    assert!(root.exists());

    drop(bundle);
    assert!(!Utf8Path::new(&root).exists());
}
