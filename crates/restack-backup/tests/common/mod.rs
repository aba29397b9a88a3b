//! Common test helpers for restack-backup integration tests
//!
//! Builds real `.tar.gz` bundles on disk so extraction is exercised end to end.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ─── Bundle Builder ──────────────────────────────────────────────────────────

/// Accumulates files, then writes them as a gzip'd tarball.
#[derive(Debug, Default)]
pub struct BundleBuilder {
    prefix: Option<String>,
    files: Vec<(String, Vec<u8>)>,
}

#[allow(dead_code)]
impl BundleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put every entry under `dir/` inside the archive.
    pub fn nested_in(mut self, dir: &str) -> Self {
        self.prefix = Some(dir.to_string());
        self
    }

    pub fn manifest(self, json: &str) -> Self {
        self.file("manifest.json", json.as_bytes())
    }

    pub fn file(mut self, path: &str, content: &[u8]) -> Self {
        self.files.push((path.to_string(), content.to_vec()));
        self
    }

    /// Write the archive into `dir` and return its path.
    pub fn write_to(&self, dir: &Path) -> PathBuf {
        let path = dir.join("backup.tar.gz");
        let encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        let mut tar = tar::Builder::new(encoder);

        for (name, content) in &self.files {
            let full = match &self.prefix {
                Some(prefix) => format!("{}/{}", prefix, name),
                None => name.clone(),
            };
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            tar.append_data(&mut header, &full, content.as_slice())
                .unwrap();
        }

        tar.into_inner().unwrap().finish().unwrap();
        path
    }
}

// ─── Manifest Fixtures ───────────────────────────────────────────────────────

/// Two containers: a postgres success and a failed one.
#[allow(dead_code)]
pub fn two_container_manifest() -> &'static str {
    r#"{
        "id": "backup-e2e",
        "name": "e2e",
        "summary": { "totalContainers": 2, "successful": 1, "failed": 1 },
        "containers": [
            {
                "name": "alexandria-db",
                "image": "postgres:16",
                "status": "success",
                "volumeFiles": ["alexandria_pgdata.tar.gz"],
                "database": { "engine": "postgres", "dumpFile": "alexandria.dump" }
            },
            { "name": "argos", "image": "argos:1", "status": "failed" }
        ],
        "networks": [{ "name": "alexandria_default", "driver": "bridge", "external": false }]
    }"#
}

#[allow(dead_code)]
pub fn temp_dir() -> TempDir {
    TempDir::new().unwrap()
}
