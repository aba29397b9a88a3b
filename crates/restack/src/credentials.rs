//! Credential resolution for the management UI

use anyhow::Result;
use async_trait::async_trait;
use camino::Utf8PathBuf;
use dialoguer::{Input, Password};
use restack_providers::{
    ChainCredentials, CredentialProvider, Credentials, EnvCredentials, FileCredentials,
};
use std::io::IsTerminal;

/// Asks on the terminal
///
/// Only added to the chain when stdin is a terminal, and resolved before the
/// restore starts.
#[derive(Debug, Default)]
pub struct PromptCredentials;

#[async_trait]
impl CredentialProvider for PromptCredentials {
    async fn resolve(&self) -> Result<Option<Credentials>> {
        let credentials = tokio::task::spawn_blocking(|| -> Result<Credentials> {
            let username: String = Input::new()
                .with_prompt("Portainer username")
                .default("admin".to_string())
                .interact_text()?;
            let password = Password::new()
                .with_prompt("Portainer password")
                .interact()?;
            Ok(Credentials::new(username, password))
        })
        .await??;

        Ok(Some(credentials))
    }

    fn name(&self) -> &'static str {
        "prompt"
    }
}

/// Environment, then the credentials file, then (interactive only) a prompt
pub fn provider_chain(file: Option<Utf8PathBuf>, allow_prompt: bool) -> ChainCredentials {
    let mut chain = ChainCredentials::new().with(EnvCredentials);
    if let Some(path) = file {
        chain = chain.with(FileCredentials::new(path));
    }
    if allow_prompt && std::io::stdin().is_terminal() {
        chain = chain.with(PromptCredentials);
    }
    chain
}

/// Resolve once, before the restore starts
pub async fn resolve_upfront(chain: ChainCredentials) -> Option<Credentials> {
    match chain.resolve().await {
        Ok(credentials) => credentials,
        Err(e) => {
            tracing::warn!("Could not resolve management UI credentials: {:#}", e);
            None
        }
    }
}

/// Replays credentials resolved before the run
#[derive(Debug)]
pub struct Resolved(pub Option<Credentials>);

#[async_trait]
impl CredentialProvider for Resolved {
    async fn resolve(&self) -> Result<Option<Credentials>> {
        Ok(self.0.clone())
    }

    fn name(&self) -> &'static str {
        "resolved"
    }
}
