//! Restore orchestration for restack
//!
//! - [`provisioner`]: idempotent networks and volumes, destructive volume restore
//! - [`database`]: per-engine database restore behind readiness waits
//! - [`stacks`]: priority ordering and the phased stack deployment plan
//! - [`driver`]: the phase state machine tying it all together
//!
//! Nothing here prints; progress goes through a [`Reporter`].

pub mod database;
pub mod driver;
pub mod probes;
pub mod provisioner;
pub mod report;
pub mod stacks;
pub mod summary;

pub use database::{
    DatabaseDispatcher, DatabaseOutcome, DatabaseRestorer, DatabaseTally, MongoRestorer,
    MySqlRestorer, PostgresRestorer, RestoreOutcome,
};
pub use driver::{Orchestrator, OrchestratorBuilder};
pub use probes::{liveness_command, ContainerHealthProbe, ExecProbe};
pub use provisioner::{restore_script, Provisioned, Provisioner, VolumeTally};
pub use report::{DryRunEntry, DryRunReport, EventKind, MemoryReporter, Reporter, TracingReporter};
pub use stacks::{
    compose_external_networks, group_databases, sort_by_priority, SequencerSettings,
    StackReport, StackSequencer,
};
pub use summary::RestoreSummary;
