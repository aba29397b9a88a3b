//! Common test utilities for restack-orchestrator
//!
//! - Recording fakes for the container runtime, management UI and platform
//! - Bundle builders and manifest fixtures
//! - An orchestrator wired to the fakes and a manual clock

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod builders;
pub mod mocks;

pub use builders::*;
pub use mocks::*;

use restack_core::config::RestackConfig;
use restack_core::ManualClock;
use restack_orchestrator::{MemoryReporter, OrchestratorBuilder};
use std::sync::Arc;

/// Shared handles a test inspects after a run
pub struct Harness {
    pub runtime: Arc<FakeRuntime>,
    pub clock: Arc<ManualClock>,
    pub reporter: Arc<MemoryReporter>,
}

impl Harness {
    pub fn new(runtime: FakeRuntime) -> Self {
        Self {
            runtime: Arc::new(runtime),
            clock: Arc::new(ManualClock::new()),
            reporter: Arc::new(MemoryReporter::new()),
        }
    }

    /// Builder with the fakes, default config and the manual clock
    pub fn builder(&self) -> OrchestratorBuilder {
        OrchestratorBuilder::new(self.runtime.clone())
            .config(RestackConfig::default())
            .clock(self.clock.clone())
            .reporter(self.reporter.clone())
    }
}
