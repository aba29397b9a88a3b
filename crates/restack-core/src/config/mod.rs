//! Configuration loading and management
//!
//! `restack.yaml` describes how to talk to the host: which docker binary to
//! shell out to, where the management UI and the internal platform listen,
//! how long to wait for things, and which stacks to deploy first.

mod loader;

pub use loader::{ConfigLoader, CONFIG_FILE_NAME};

use crate::types::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RestackConfig {
    pub runtime: RuntimeSection,
    pub readiness: ReadinessSection,
    pub retry: RetryPolicy,
    pub management_ui: ManagementUiSection,
    pub platform: PlatformSection,
    pub stacks: StacksSection,
}

/// Container runtime settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RuntimeSection {
    /// Docker CLI used for every runtime call
    pub docker_bin: String,

    /// Image used for throwaway volume-restore containers
    pub helper_image: String,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            docker_bin: "docker".to_string(),
            helper_image: "alpine:3.19".to_string(),
        }
    }
}

/// Bounds for the readiness gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ReadinessSection {
    pub poll_interval_secs: u64,
    pub database_wait_secs: u64,
    pub stack_wait_secs: u64,
    pub management_ui_wait_secs: u64,

    /// Pause after a database reports healthy before restoring into it
    pub settle_delay_secs: u64,
}

impl Default for ReadinessSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: 2,
            database_wait_secs: 60,
            stack_wait_secs: 120,
            management_ui_wait_secs: 60,
            settle_delay_secs: 5,
        }
    }
}

impl ReadinessSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn database_wait(&self) -> Duration {
        Duration::from_secs(self.database_wait_secs)
    }

    pub fn stack_wait(&self) -> Duration {
        Duration::from_secs(self.stack_wait_secs)
    }

    pub fn management_ui_wait(&self) -> Duration {
        Duration::from_secs(self.management_ui_wait_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }
}

/// Management UI (Portainer) connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ManagementUiSection {
    pub url: String,

    /// Endpoint to deploy into; the first endpoint is used when unset
    pub endpoint: Option<String>,

    /// Container running the management UI
    pub container: String,

    /// Volume holding its data
    pub volume: String,

    /// Management UIs usually serve a self-signed certificate
    pub accept_invalid_certs: bool,
}

impl Default for ManagementUiSection {
    fn default() -> Self {
        Self {
            url: "https://localhost:9443".to_string(),
            endpoint: None,
            container: "portainer".to_string(),
            volume: "portainer_data".to_string(),
            accept_invalid_certs: true,
        }
    }
}

/// Secondary internal platform API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PlatformSection {
    pub url: Option<String>,

    /// Stack that hosts the platform
    pub group: String,
}

impl Default for PlatformSection {
    fn default() -> Self {
        Self {
            url: None,
            group: "alexandria".to_string(),
        }
    }
}

/// Stack ordering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct StacksSection {
    /// Groups deployed first, in this order; the rest follow in discovery order
    pub priority: Vec<String>,
    pub phased: PhasedSection,
}

impl Default for StacksSection {
    fn default() -> Self {
        Self {
            priority: vec![
                "alexandria".to_string(),
                "ducks-ecosystem".to_string(),
                "argos".to_string(),
            ],
            phased: PhasedSection::default(),
        }
    }
}

/// The two named groups of the phased plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PhasedSection {
    pub foundation: String,
    pub dependent: String,
}

impl Default for PhasedSection {
    fn default() -> Self {
        Self {
            foundation: "alexandria".to_string(),
            dependent: "ducks-ecosystem".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RestackConfig::default();
        assert_eq!(config.runtime.docker_bin, "docker");
        assert_eq!(config.readiness.database_wait(), Duration::from_secs(60));
        assert_eq!(config.readiness.stack_wait(), Duration::from_secs(120));
        assert_eq!(config.management_ui.url, "https://localhost:9443");
        assert_eq!(config.stacks.priority[0], "alexandria");
        assert_eq!(config.stacks.phased.dependent, "ducks-ecosystem");
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
management-ui:
  url: https://portainer.lan:9443
  endpoint: primary
readiness:
  stack-wait-secs: 300
"#;
        let config: RestackConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.management_ui.url, "https://portainer.lan:9443");
        assert_eq!(config.management_ui.endpoint.as_deref(), Some("primary"));
        assert_eq!(config.management_ui.container, "portainer");
        assert_eq!(config.readiness.stack_wait_secs, 300);
        assert_eq!(config.readiness.database_wait_secs, 60);
        assert_eq!(config.runtime.helper_image, "alpine:3.19");
    }

    #[test]
    fn test_poll_interval_never_zero() {
        let section = ReadinessSection {
            poll_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(section.poll_interval(), Duration::from_secs(1));
    }
}
