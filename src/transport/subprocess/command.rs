//! CLI command building logic for agent subprocesses

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use crate::types::identifiers::ResumeToken;
use crate::types::options::AgentSettings;

use super::config::DANGEROUS_ENV_VARS;

/// What to ask the agent for one turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentInvocation {
    /// Prompt text
    pub prompt: String,
    /// Model identifier
    pub model: String,
    /// Agent conversation to continue
    pub resume_token: Option<ResumeToken>,
}

/// Command builder for the agent CLI
pub struct CommandBuilder<'a> {
    cli_path: &'a Path,
    invocation: &'a AgentInvocation,
    settings: &'a AgentSettings,
}

impl<'a> CommandBuilder<'a> {
    /// Create a new command builder
    pub fn new(
        cli_path: &'a Path,
        invocation: &'a AgentInvocation,
        settings: &'a AgentSettings,
    ) -> Self {
        Self {
            cli_path,
            invocation,
            settings,
        }
    }

    /// Build the complete CLI command with all arguments
    pub fn build(&self) -> Command {
        let mut cmd = Command::new(self.cli_path);

        // Base arguments
        cmd.arg("--print")
            .arg("--output-format")
            .arg("stream-json")
            .arg("--verbose");

        cmd.arg("--model").arg(&self.invocation.model);

        if let Some(ref token) = self.invocation.resume_token {
            cmd.arg("--resume").arg(token.as_str());
        }

        self.add_permission_args(&mut cmd);
        self.add_environment(&mut cmd);

        cmd.current_dir(&self.settings.vault_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd.arg("--").arg(&self.invocation.prompt);

        cmd
    }

    /// Add permission mode and capability arguments
    ///
    /// Disabled capabilities are always denied explicitly; the agent treats
    /// anything not denied as permitted.
    fn add_permission_args(&self, cmd: &mut Command) {
        cmd.arg("--permission-mode")
            .arg(self.settings.permission_mode.as_cli_arg());

        let allowed = self.settings.permissions.allowed_tools();
        if !allowed.is_empty() {
            cmd.arg("--allowedTools").arg(allowed.join(","));
        }

        let denied = self.settings.permissions.denied_tools();
        if !denied.is_empty() {
            cmd.arg("--disallowedTools").arg(denied.join(","));
        }
    }

    /// Add filtered user environment variables
    fn add_environment(&self, cmd: &mut Command) {
        for (key, value) in &self.settings.env {
            if DANGEROUS_ENV_VARS.contains(&key.as_str()) {
                log::warn!("Ignoring dangerous environment override {key}");
                continue;
            }
            cmd.env(key, value);
        }

        cmd.env("CLAUDE_CODE_ENTRYPOINT", "sdk-rust");
        cmd.env("PWD", &self.settings.vault_root);
    }
}
