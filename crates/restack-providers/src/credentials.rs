//! Management UI credential sources
//!
//! Credentials are resolved once, before any deployment starts. A source
//! returns `Ok(None)` when it simply has nothing to offer.

use anyhow::{Context, Result};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use tracing::debug;

pub const USERNAME_VAR: &str = "RESTACK_PORTAINER_USERNAME";
pub const PASSWORD_VAR: &str = "RESTACK_PORTAINER_PASSWORD";

/// Username and password for the management UI
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// A place credentials can come from
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn resolve(&self) -> Result<Option<Credentials>>;

    /// Source name for logs
    fn name(&self) -> &'static str;
}

/// `RESTACK_PORTAINER_USERNAME` / `RESTACK_PORTAINER_PASSWORD`
#[derive(Debug, Default)]
pub struct EnvCredentials;

#[async_trait]
impl CredentialProvider for EnvCredentials {
    async fn resolve(&self) -> Result<Option<Credentials>> {
        let username = std::env::var(USERNAME_VAR).ok().filter(|v| !v.is_empty());
        let password = std::env::var(PASSWORD_VAR).ok().filter(|v| !v.is_empty());

        Ok(match (username, password) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            _ => None,
        })
    }

    fn name(&self) -> &'static str {
        "environment"
    }
}

/// A credentials file
///
/// Either `username=...` / `password=...` lines, or the username on the
/// first line and the password on the second.
#[derive(Debug)]
pub struct FileCredentials {
    path: Utf8PathBuf,
}

impl FileCredentials {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn parse(content: &str) -> Option<Credentials> {
        let lines: Vec<&str> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .collect();

        let mut username = None;
        let mut password = None;
        for line in &lines {
            if let Some((key, value)) = line.split_once('=') {
                match key.trim().to_ascii_lowercase().as_str() {
                    "username" | "user" => username = Some(value.trim().to_string()),
                    "password" => password = Some(value.trim().to_string()),
                    _ => {}
                }
            }
        }

        match (username, password) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            _ if lines.len() >= 2 && !lines[0].contains('=') => {
                Some(Credentials::new(lines[0], lines[1]))
            }
            _ => None,
        }
    }
}

#[async_trait]
impl CredentialProvider for FileCredentials {
    async fn resolve(&self) -> Result<Option<Credentials>> {
        if !self.path.exists() {
            debug!("credentials file {} not present", self.path);
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read credentials file {}", self.path))?;
        Ok(Self::parse(&content))
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Tries each provider in order; the first that yields credentials wins
#[derive(Default)]
pub struct ChainCredentials {
    providers: Vec<Box<dyn CredentialProvider>>,
}

impl ChainCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: impl CredentialProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl CredentialProvider for ChainCredentials {
    async fn resolve(&self) -> Result<Option<Credentials>> {
        for provider in &self.providers {
            if let Some(credentials) = provider.resolve().await? {
                debug!("credentials resolved from {}", provider.name());
                return Ok(Some(credentials));
            }
        }
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "chain"
    }
}
