//! Lifecycle management for agent subprocesses (locate, spawn)

use std::env;
use std::io::ErrorKind;
use std::path::PathBuf;

use tokio::process::{Child, ChildStderr, ChildStdout};

use crate::error::{ChatError, Result};
use crate::types::options::AgentSettings;

use super::command::{AgentInvocation, CommandBuilder};
use super::config::CLI_BINARY_NAME;

/// A freshly spawned agent process with its output pipes taken
pub struct AgentProcess {
    /// Child process handle
    pub child: Child,
    /// Structured output
    pub stdout: ChildStdout,
    /// Diagnostics
    pub stderr: ChildStderr,
}

/// Find the agent CLI binary
///
/// An explicitly configured path wins. Otherwise `PATH` is searched, then a
/// few common install locations.
///
/// # Errors
/// Returns error if the CLI cannot be found
pub fn resolve_cli_path(settings: &AgentSettings) -> Result<PathBuf> {
    if let Some(ref path) = settings.cli_path {
        return Ok(path.clone());
    }

    if let Ok(path) = which::which(CLI_BINARY_NAME) {
        return Ok(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| String::from("/root"));
    let home = PathBuf::from(home);
    let locations = [
        home.join(".claude/local/claude"),
        home.join(".npm-global/bin/claude"),
        PathBuf::from("/usr/local/bin/claude"),
        PathBuf::from("/opt/homebrew/bin/claude"),
        home.join(".local/bin/claude"),
        home.join("node_modules/.bin/claude"),
        home.join(".yarn/bin/claude"),
    ];

    locations
        .into_iter()
        .find(|path| path.is_file())
        .ok_or_else(ChatError::cli_not_found)
}

/// Spawn the agent CLI for one turn
///
/// # Errors
/// Returns error if the CLI cannot be located or started, or if its output
/// pipes are unavailable
pub fn spawn_agent(settings: &AgentSettings, invocation: &AgentInvocation) -> Result<AgentProcess> {
    let cli_path = resolve_cli_path(settings)?;
    let mut cmd = CommandBuilder::new(&cli_path, invocation, settings).build();

    let mut child = cmd.spawn().map_err(|e| {
        if !settings.vault_root.exists() {
            return ChatError::spawn(format!(
                "Vault directory does not exist: {}",
                settings.vault_root.display()
            ));
        }
        match e.kind() {
            ErrorKind::NotFound => {
                ChatError::CliNotFound(format!("{}: {e}", cli_path.display()))
            }
            ErrorKind::PermissionDenied => {
                ChatError::spawn(format!("{} is not executable: {e}", cli_path.display()))
            }
            _ => ChatError::spawn(format!("Failed to start {}: {e}", cli_path.display())),
        }
    })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ChatError::spawn("Failed to get stdout handle"))?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ChatError::spawn("Failed to get stderr handle"))?;

    Ok(AgentProcess {
        child,
        stdout,
        stderr,
    })
}
