//! Error types for restack-core
//!
//! The variants follow the recovery taxonomy: only `FatalInput` (and the
//! conversions that wrap it at parse time) stop a run. Everything else is
//! logged, counted and the driver carries on with the next unit.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using restack-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for restack
#[derive(Error, Debug)]
pub enum Error {
    /// Bad or missing archive, missing manifest, malformed required field
    #[error("Invalid input: {message}")]
    FatalInput { message: String },

    /// Volume or network provisioning failed
    #[error("Resource '{resource}' failed: {message}")]
    Resource { resource: String, message: String },

    /// A unit never reached a terminal ready state within its bound
    #[error("'{target}' was not ready after {:.0}s", .waited.as_secs_f64())]
    ReadinessTimeout { target: String, waited: Duration },

    /// A unit reported itself unhealthy
    #[error("'{target}' reported unhealthy")]
    Unhealthy { target: String },

    /// Management-UI or platform API call failed
    #[error("Remote call '{operation}' failed: {message}")]
    RemoteCall { operation: String, message: String },

    /// Database engine not supported by any restore strategy
    #[error("Unknown database engine: {engine}")]
    UnknownEngine { engine: String },

    /// Configuration file could not be loaded
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),
}

impl Error {
    /// Create a fatal input error
    pub fn fatal_input(message: impl Into<String>) -> Self {
        Self::FatalInput {
            message: message.into(),
        }
    }

    /// Create a resource error
    pub fn resource(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resource {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Create a readiness timeout error
    pub fn readiness_timeout(target: impl Into<String>, waited: Duration) -> Self {
        Self::ReadinessTimeout {
            target: target.into(),
            waited,
        }
    }

    /// Create an unhealthy error
    pub fn unhealthy(target: impl Into<String>) -> Self {
        Self::Unhealthy {
            target: target.into(),
        }
    }

    /// Create a remote call error
    pub fn remote_call(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteCall {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an unknown engine error
    pub fn unknown_engine(engine: impl Into<String>) -> Self {
        Self::UnknownEngine {
            engine: engine.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalInput { .. } | Self::Config { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_input_and_config_errors_are_fatal() {
        assert!(Error::fatal_input("no manifest").is_fatal());
        assert!(Error::config("bad yaml").is_fatal());

        assert!(!Error::resource("vol", "tar exited 2").is_fatal());
        assert!(!Error::readiness_timeout("db", Duration::from_secs(60)).is_fatal());
        assert!(!Error::remote_call("auth", "401").is_fatal());
        assert!(!Error::unknown_engine("cassandra").is_fatal());
    }

    #[test]
    fn test_timeout_display_includes_wait() {
        let err = Error::readiness_timeout("postgres", Duration::from_secs(60));
        assert_eq!(err.to_string(), "'postgres' was not ready after 60s");
    }
}
