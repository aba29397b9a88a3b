//! Backup bundle builders and manifest fixtures

#![allow(dead_code)]

use camino::Utf8PathBuf;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use tempfile::TempDir;

/// Accumulates files, then writes them as `backup.tar.gz`
#[derive(Debug, Default)]
pub struct BundleBuilder {
    files: Vec<(String, Vec<u8>)>,
}

impl BundleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn manifest(self, json: &str) -> Self {
        self.file("manifest.json", json.as_bytes())
    }

    pub fn file(mut self, path: &str, content: &[u8]) -> Self {
        self.files.push((path.to_string(), content.to_vec()));
        self
    }

    /// `data/<container>/<file>`
    pub fn data(self, container: &str, file: &str) -> Self {
        let path = format!("data/{}/{}", container, file);
        self.file(&path, b"archived bytes")
    }

    pub fn compose(self) -> Self {
        self.file("docker-compose.yml", b"services: {}\n")
    }

    pub fn write_to(&self, dir: &TempDir) -> Utf8PathBuf {
        let path = dir.path().join("backup.tar.gz");
        let encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        let mut tar = tar::Builder::new(encoder);

        for (name, content) in &self.files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            tar.append_data(&mut header, name, content.as_slice())
                .unwrap();
        }

        tar.into_inner().unwrap().finish().unwrap();
        Utf8PathBuf::from_path_buf(path).unwrap()
    }
}

/// Postgres success plus a container that failed at backup time
pub const TWO_CONTAINER_MANIFEST: &str = r#"{
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
    "networks": [{ "name": "alexandria_default", "driver": "bridge" }]
}"#;

/// The two-container backup with all its data files
pub fn two_container_bundle() -> BundleBuilder {
    BundleBuilder::new()
        .manifest(TWO_CONTAINER_MANIFEST)
        .data("alexandria-db", "alexandria_pgdata.tar.gz")
        .data("alexandria-db", "alexandria.dump")
}

/// Three stacks: alexandria (postgres), ducks-ecosystem (mongo), argos (no db)
pub const STACKS_MANIFEST: &str = r#"{
    "id": "backup-stacks",
    "name": "stacks",
    "summary": { "totalContainers": 3, "successful": 3, "failed": 0 },
    "containers": [
        {
            "name": "alexandria-db",
            "image": "postgres:16",
            "status": "success",
            "stack": "alexandria",
            "volumeFiles": ["alexandria_pgdata.tar.gz"],
            "database": { "engine": "postgres", "dumpFile": "alexandria.dump" }
        },
        {
            "name": "ducks-mongo",
            "image": "mongo:7",
            "status": "success",
            "stack": "ducks-ecosystem",
            "volumeFiles": ["ducks_mongo.tar.gz"],
            "database": { "type": "mongodb", "dumpFile": "ducks.archive.gz" }
        },
        {
            "name": "argos-web",
            "image": "argos:1",
            "status": "success",
            "volumeFiles": ["argos_static.tar"]
        }
    ],
    "networks": [
        { "name": "alexandria_default" },
        { "name": "shared", "external": true }
    ]
}"#;

pub fn stacks_bundle() -> BundleBuilder {
    BundleBuilder::new()
        .manifest(STACKS_MANIFEST)
        .data("alexandria-db", "alexandria_pgdata.tar.gz")
        .data("alexandria-db", "alexandria.dump")
        .data("ducks-mongo", "ducks_mongo.tar.gz")
        .data("ducks-mongo", "ducks.archive.gz")
        .data("argos-web", "argos_static.tar")
}

/// Stack file referencing an external network
pub const EXTERNAL_NETWORK_STACK: &str = r#"
services:
  api:
    image: api:latest
    networks: [shared]
networks:
  shared:
    external: true
"#;

pub const PLAIN_STACK: &str = "services:\n  web:\n    image: web:latest\n";

pub fn temp_dir() -> TempDir {
    TempDir::new().unwrap()
}
