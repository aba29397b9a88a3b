//! Host adapters for restack
//!
//! Every side effect a restore has on the host goes through one of the
//! traits in [`traits`]. This crate provides the real implementations:
//! - `DockerRuntime`: the docker CLI
//! - `PortainerClient`: the Portainer management UI API
//! - `PlatformClient`: the internal platform's project API
//!
//! plus credential sources and an HTTP readiness probe.

pub mod credentials;
pub mod docker;
pub mod platform;
pub mod portainer;
pub mod probes;
pub mod traits;
mod utils;

pub use credentials::{
    ChainCredentials, CredentialProvider, Credentials, EnvCredentials, FileCredentials,
};
pub use docker::DockerRuntime;
pub use platform::PlatformClient;
pub use portainer::PortainerClient;
pub use probes::HttpProbe;
pub use traits::{
    ContainerHealth, ContainerRuntime, Endpoint, EnvVar, EphemeralSpec, ExecInput, ExecOutput,
    HealthStatus, ManagementApi, PlatformApi, PlatformProject, StackDescriptor,
};
pub use utils::command_exists;
