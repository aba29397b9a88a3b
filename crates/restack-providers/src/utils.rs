//! Utility functions for host adapters

use anyhow::{bail, Context, Result};
use url::Url;

/// Check if a command is available in PATH
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Validate a configured API base URL
///
/// Only http and https are accepted. The trailing slash is dropped so paths
/// can be joined with [`join_url`].
pub fn parse_base_url(raw: &str) -> Result<String> {
    let url = Url::parse(raw.trim()).with_context(|| format!("Invalid URL: {}", raw))?;
    match url.scheme() {
        "http" | "https" => {}
        other => bail!("Unsupported URL scheme '{}' in {}", other, raw),
    }
    if url.host_str().is_none() {
        bail!("URL has no host: {}", raw);
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Join a base URL and an API path without doubling or dropping slashes
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
