//! CLI bootstrap - the composition root.
//!
//! The supervisor and its collaborators are instantiated here and nowhere
//! else. Handlers receive a `CliContext`.

use anyhow::{Context, Result};
use llamactl_core::SupervisorConfig;
use llamactl_runtime::Supervisor;
use std::path::PathBuf;

use crate::parser::Cli;

/// Resolve the supervisor configuration for this invocation.
///
/// `LLAMACTL_*` variables (including a loaded `.env`) provide the base, and
/// `--server-path` overrides the binary.
pub fn resolve_config(server_path: Option<PathBuf>) -> Result<SupervisorConfig> {
    let mut config = SupervisorConfig::from_env().context("Invalid llamactl configuration")?;
    if let Some(path) = server_path {
        config.server_path = path;
    }
    Ok(config)
}

/// Everything a command handler needs.
pub struct CliContext {
    pub supervisor: Supervisor,
}

/// Build the context for `cli`.
pub fn bootstrap(cli: &Cli) -> Result<CliContext> {
    let config = resolve_config(cli.server_path.clone())?;

    if !config.server_path.exists() {
        anyhow::bail!(
            "llama-server not found at {}\n\nPass --server-path or set LLAMACTL_SERVER_PATH.",
            config.server_path.display()
        );
    }

    tracing::debug!(server_path = %config.server_path.display(), host = %config.host, "Bootstrapping supervisor");
    let supervisor = Supervisor::new(config)?;

    Ok(CliContext { supervisor })
}
