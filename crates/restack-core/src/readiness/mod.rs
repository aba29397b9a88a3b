//! Readiness gate
//!
//! Converts an asynchronous "becoming ready" condition into a synchronous
//! terminal outcome. Probes are pluggable (container health, TCP, HTTP,
//! exec-based liveness); time comes from an injectable [`Clock`].

mod clock;
mod gate;
mod probe;

pub use clock::{Clock, ManualClock, TokioClock};
pub use gate::{Readiness, ReadinessGate, DEFAULT_POLL_INTERVAL};
pub use probe::{Probe, ProbeSignal, RedundantProbe, TcpProbe};
