//! Database restore dispatch
//!
//! Each engine has its own [`DatabaseRestorer`]. The dispatcher waits for
//! the target container, lets it settle, then hands the dump to the
//! restorer for the descriptor's engine.

use crate::probes::ContainerHealthProbe;
use crate::provisioner::shell_quote;
use crate::report::Reporter;
use async_trait::async_trait;
use camino::Utf8Path;
use restack_backup::{BackupBundle, ContainerRecord, DatabaseDescriptor, DatabaseEngine};
use restack_core::{Error, Readiness, ReadinessGate, Result};
use restack_providers::{ContainerRuntime, ExecInput, ExecOutput};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How a restore that did not fail went
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Clean,
    /// The tool exited non-zero but the data is expected to be in place
    WithWarnings(String),
}

/// Restores a dump into a running container of one engine
#[async_trait]
pub trait DatabaseRestorer: Send + Sync {
    fn engine(&self) -> DatabaseEngine;

    async fn restore(
        &self,
        container: &str,
        descriptor: &DatabaseDescriptor,
        dump: &Utf8Path,
    ) -> Result<RestoreOutcome>;
}

fn remote_err(container: &str, err: anyhow::Error) -> Error {
    Error::resource(container, format!("{:#}", err))
}

fn exit_failure(container: &str, tool: &str, output: &ExecOutput) -> Error {
    Error::resource(
        container,
        format!("{} exited with {}: {}", tool, output.code, output.stderr.trim()),
    )
}

fn dump_name(dump: &Utf8Path) -> &str {
    dump.file_name().unwrap_or("dump")
}

fn sh(script: String) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), script]
}

/// `pg_restore --clean --if-exists`, or `psql` for plain SQL dumps
pub struct PostgresRestorer {
    runtime: Arc<dyn ContainerRuntime>,
}

impl PostgresRestorer {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    fn command(descriptor: &DatabaseDescriptor, target: &str) -> Vec<String> {
        let user = descriptor.user.as_deref().unwrap_or("postgres");
        let database = descriptor.database.as_deref().unwrap_or("postgres");

        if target.ends_with(".sql.gz") {
            sh(format!(
                "gunzip -c {} | psql -U {} -d {}",
                shell_quote(target),
                shell_quote(user),
                shell_quote(database)
            ))
        } else if target.ends_with(".sql") {
            ["psql", "-U", user, "-d", database, "-f", target]
                .map(String::from)
                .to_vec()
        } else {
            [
                "pg_restore",
                "-U",
                user,
                "-d",
                database,
                "--clean",
                "--if-exists",
                "--no-owner",
                target,
            ]
            .map(String::from)
            .to_vec()
        }
    }
}

#[async_trait]
impl DatabaseRestorer for PostgresRestorer {
    fn engine(&self) -> DatabaseEngine {
        DatabaseEngine::Postgres
    }

    async fn restore(
        &self,
        container: &str,
        descriptor: &DatabaseDescriptor,
        dump: &Utf8Path,
    ) -> Result<RestoreOutcome> {
        let target = format!("/tmp/{}", dump_name(dump));
        self.runtime
            .copy_into(container, dump, &target)
            .await
            .map_err(|e| remote_err(container, e))?;

        let output = self
            .runtime
            .exec_in(container, &Self::command(descriptor, &target), ExecInput::None)
            .await
            .map_err(|e| remote_err(container, e))?;

        if output.success() {
            Ok(RestoreOutcome::Clean)
        } else {
            // pg_restore exits non-zero on ownership and extension notices
            Ok(RestoreOutcome::WithWarnings(format!(
                "pg_restore exited with {}: {}",
                output.code,
                output.stderr.lines().next().unwrap_or("").trim()
            )))
        }
    }
}

/// Streams a SQL dump into the `mariadb`/`mysql` client
pub struct MySqlRestorer {
    runtime: Arc<dyn ContainerRuntime>,
    engine: DatabaseEngine,
}

impl MySqlRestorer {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, engine: DatabaseEngine) -> Self {
        Self { runtime, engine }
    }

    fn command(descriptor: &DatabaseDescriptor, dump: &str) -> Vec<String> {
        let user = descriptor.user.as_deref().unwrap_or("root");
        let database = descriptor
            .database
            .as_deref()
            .map(|db| format!(" {}", shell_quote(db)))
            .unwrap_or_default();
        let decompress = if dump.ends_with(".gz") { "gunzip -c | " } else { "" };

        sh(format!(
            "pw=\"${{MARIADB_ROOT_PASSWORD:-${{MYSQL_ROOT_PASSWORD:-${{MARIADB_PASSWORD:-$MYSQL_PASSWORD}}}}}}\"; \
             client=$(command -v mariadb || command -v mysql); \
             {}\"$client\" -u{} ${{pw:+-p\"$pw\"}}{}",
            decompress,
            shell_quote(user),
            database
        ))
    }
}

#[async_trait]
impl DatabaseRestorer for MySqlRestorer {
    fn engine(&self) -> DatabaseEngine {
        self.engine
    }

    async fn restore(
        &self,
        container: &str,
        descriptor: &DatabaseDescriptor,
        dump: &Utf8Path,
    ) -> Result<RestoreOutcome> {
        let command = Self::command(descriptor, dump_name(dump));
        let output = self
            .runtime
            .exec_in(container, &command, ExecInput::File(dump.to_owned()))
            .await
            .map_err(|e| remote_err(container, e))?;

        if output.success() {
            Ok(RestoreOutcome::Clean)
        } else {
            Err(exit_failure(container, self.engine.as_str(), &output))
        }
    }
}

/// `mongorestore --archive --drop`
pub struct MongoRestorer {
    runtime: Arc<dyn ContainerRuntime>,
}

impl MongoRestorer {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    fn command(target: &str) -> Vec<String> {
        let gzip = if target.ends_with(".gz") { " --gzip" } else { "" };
        sh(format!(
            "mongorestore ${{MONGO_INITDB_ROOT_USERNAME:+--username \"$MONGO_INITDB_ROOT_USERNAME\" \
             --password \"$MONGO_INITDB_ROOT_PASSWORD\" --authenticationDatabase admin}} \
             --archive={}{} --drop",
            shell_quote(target),
            gzip
        ))
    }
}

#[async_trait]
impl DatabaseRestorer for MongoRestorer {
    fn engine(&self) -> DatabaseEngine {
        DatabaseEngine::MongoDb
    }

    async fn restore(
        &self,
        container: &str,
        _descriptor: &DatabaseDescriptor,
        dump: &Utf8Path,
    ) -> Result<RestoreOutcome> {
        let target = format!("/tmp/{}", dump_name(dump));
        self.runtime
            .copy_into(container, dump, &target)
            .await
            .map_err(|e| remote_err(container, e))?;

        let output = self
            .runtime
            .exec_in(container, &Self::command(&target), ExecInput::None)
            .await
            .map_err(|e| remote_err(container, e))?;

        if output.success() {
            Ok(RestoreOutcome::Clean)
        } else {
            Err(exit_failure(container, "mongorestore", &output))
        }
    }
}

/// Outcome for one container
#[derive(Debug)]
pub enum DatabaseOutcome {
    Restored,
    /// Never became ready; nothing attempted
    Skipped(String),
    Failed(Error),
    /// Engine has no restorer; not counted
    UnknownEngine(String),
}

/// Counts for a batch of database restores
#[derive(Debug, Default)]
pub struct DatabaseTally {
    pub restored: usize,
    pub failed: usize,
    pub skipped: usize,
    pub warnings: Vec<String>,
}

impl DatabaseTally {
    pub fn record(&mut self, outcome: DatabaseOutcome) {
        match outcome {
            DatabaseOutcome::Restored => self.restored += 1,
            DatabaseOutcome::Skipped(reason) => {
                self.skipped += 1;
                self.warnings.push(reason);
            }
            DatabaseOutcome::Failed(err) => {
                self.failed += 1;
                self.warnings.push(err.to_string());
            }
            DatabaseOutcome::UnknownEngine(reason) => self.warnings.push(reason),
        }
    }
}

pub struct DatabaseDispatcher {
    runtime: Arc<dyn ContainerRuntime>,
    gate: ReadinessGate,
    settle_delay: Duration,
    reporter: Arc<dyn Reporter>,
}

impl DatabaseDispatcher {
    /// `gate` bounds the wait for each database container
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        gate: ReadinessGate,
        settle_delay: Duration,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            runtime,
            gate,
            settle_delay,
            reporter,
        }
    }

    pub fn restorer(&self, engine: DatabaseEngine) -> Box<dyn DatabaseRestorer> {
        let runtime = self.runtime.clone();
        match engine {
            DatabaseEngine::Postgres => Box::new(PostgresRestorer::new(runtime)),
            DatabaseEngine::MySql | DatabaseEngine::MariaDb => {
                Box::new(MySqlRestorer::new(runtime, engine))
            }
            DatabaseEngine::MongoDb => Box::new(MongoRestorer::new(runtime)),
        }
    }

    /// Wait for the container, then restore into it
    pub async fn restore_one(
        &self,
        bundle: &BackupBundle,
        record: &ContainerRecord,
    ) -> DatabaseOutcome {
        let Some(descriptor) = record.database.as_ref() else {
            return DatabaseOutcome::Skipped(format!("{} has no database", record.name));
        };
        if let Err(e) = descriptor.engine() {
            return self.unknown_engine(&record.name, &e.0);
        }

        self.reporter
            .info(&format!("Waiting for {} to become ready", record.name));
        let probe = ContainerHealthProbe::new(self.runtime.clone(), record.name.clone());
        match self.gate.wait(&probe).await {
            Readiness::Ready { .. } => self.restore_ready(bundle, record).await,
            other => {
                let reason = match other {
                    Readiness::Unhealthy { .. } => {
                        format!("{} is unhealthy, skipping its database restore", record.name)
                    }
                    _ => format!(
                        "{} not ready after {:.0}s, skipping its database restore",
                        record.name,
                        other.elapsed().as_secs_f64()
                    ),
                };
                self.reporter.warn(&reason);
                DatabaseOutcome::Skipped(reason)
            }
        }
    }

    /// Restore into a container already known to be ready
    pub async fn restore_ready(
        &self,
        bundle: &BackupBundle,
        record: &ContainerRecord,
    ) -> DatabaseOutcome {
        let Some(descriptor) = record.database.as_ref() else {
            return DatabaseOutcome::Skipped(format!("{} has no database", record.name));
        };
        let engine = match descriptor.engine() {
            Ok(engine) => engine,
            Err(e) => return self.unknown_engine(&record.name, &e.0),
        };

        let dump = bundle.data_file(&record.name, &descriptor.dump_file);
        if !dump.is_file() {
            let err = Error::resource(&record.name, format!("dump {} not found", dump));
            self.reporter.error(&err.to_string());
            return DatabaseOutcome::Failed(err);
        }

        if !self.settle_delay.is_zero() {
            debug!(
                "Letting {} settle for {:?} before restoring",
                record.name, self.settle_delay
            );
            self.gate.clock().sleep(self.settle_delay).await;
        }

        self.reporter.info(&format!(
            "Restoring {} database into {}",
            engine, record.name
        ));
        match self
            .restorer(engine)
            .restore(&record.name, descriptor, &dump)
            .await
        {
            Ok(RestoreOutcome::Clean) => {
                self.reporter
                    .success(&format!("Restored {} database {}", engine, record.name));
                DatabaseOutcome::Restored
            }
            Ok(RestoreOutcome::WithWarnings(detail)) => {
                self.reporter.warn(&format!(
                    "Restored {} database {} with warnings: {}",
                    engine, record.name, detail
                ));
                DatabaseOutcome::Restored
            }
            Err(e) => {
                self.reporter.error(&e.to_string());
                DatabaseOutcome::Failed(e)
            }
        }
    }

    /// Restore every successful database container not in `exclude`
    pub async fn restore_all(
        &self,
        bundle: &BackupBundle,
        records: &[&ContainerRecord],
        exclude: &BTreeSet<String>,
    ) -> DatabaseTally {
        let mut tally = DatabaseTally::default();

        for record in records
            .iter()
            .filter(|r| r.is_success() && r.database.is_some())
        {
            if exclude.contains(&record.name) {
                debug!("Database in {} already restored", record.name);
                continue;
            }
            let outcome = self.restore_one(bundle, record).await;
            tally.record(outcome);
        }

        if tally.restored == 0 && tally.failed == 0 && tally.skipped == 0 {
            info!("No databases needed restoring");
            self.reporter.info("No databases were restored");
        }

        tally
    }

    fn unknown_engine(&self, container: &str, engine: &str) -> DatabaseOutcome {
        let reason = format!(
            "{}: {}, database restore skipped",
            container,
            Error::unknown_engine(engine)
        );
        warn!("{}", reason);
        self.reporter.warn(&reason);
        DatabaseOutcome::UnknownEngine(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(engine: &str, dump: &str) -> DatabaseDescriptor {
        DatabaseDescriptor {
            engine: engine.to_string(),
            dump_file: dump.to_string(),
            user: None,
            database: None,
        }
    }

    #[test]
    fn test_postgres_custom_format_uses_pg_restore() {
        let cmd = PostgresRestorer::command(&descriptor("postgres", "db.dump"), "/tmp/db.dump");
        assert_eq!(cmd[0], "pg_restore");
        assert!(cmd.contains(&"--clean".to_string()));
        assert!(cmd.contains(&"--if-exists".to_string()));
        assert_eq!(cmd.last().map(String::as_str), Some("/tmp/db.dump"));
    }

    #[test]
    fn test_postgres_plain_sql_uses_psql() {
        let mut desc = descriptor("postgres", "db.sql");
        desc.user = Some("app".to_string());
        let cmd = PostgresRestorer::command(&desc, "/tmp/db.sql");
        assert_eq!(cmd, ["psql", "-U", "app", "-d", "postgres", "-f", "/tmp/db.sql"]);
    }

    #[test]
    fn test_mysql_decompresses_gzip_dumps() {
        let cmd = MySqlRestorer::command(&descriptor("mysql", "db.sql.gz"), "db.sql.gz");
        assert!(cmd[2].contains("gunzip -c | \"$client\" -u'root'"));

        let plain = MySqlRestorer::command(&descriptor("mysql", "db.sql"), "db.sql");
        assert!(!plain[2].contains("gunzip"));
    }

    #[test]
    fn test_mongo_drops_and_detects_gzip() {
        let cmd = MongoRestorer::command("/tmp/m.archive.gz");
        assert!(cmd[2].contains("--archive='/tmp/m.archive.gz' --gzip --drop"));
        assert!(!MongoRestorer::command("/tmp/m.archive")[2].contains("--gzip"));
    }

    #[test]
    fn test_tally_counts_unknown_as_neither() {
        let mut tally = DatabaseTally::default();
        tally.record(DatabaseOutcome::Restored);
        tally.record(DatabaseOutcome::UnknownEngine("b: unknown".into()));
        tally.record(DatabaseOutcome::Skipped("c: timeout".into()));

        assert_eq!(tally.restored, 1);
        assert_eq!(tally.failed, 0);
        assert_eq!(tally.skipped, 1);
        assert_eq!(tally.warnings.len(), 2);
    }
}
