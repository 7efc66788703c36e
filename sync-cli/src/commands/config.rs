//! Print the effective configuration.

use anyhow::{Context, Result};
use cloudsync_session::SessionConfig;

/// Render `config` as TOML.
pub fn render(config: &SessionConfig) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to serialize configuration")
}

/// Run the config command.
pub fn run(config: &SessionConfig) -> Result<()> {
    print!("{}", render(config)?);
    Ok(())
}
