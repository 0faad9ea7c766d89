//! Agent settings and configuration
//!
//! This module contains the user-facing settings that shape every agent
//! invocation, including a builder pattern for easy configuration. Settings
//! are persisted alongside the sessions under the `settings` key.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::permissions::{AgentPermissions, PermissionMode};

/// Model used when neither the session nor the caller picks one
pub const DEFAULT_MODEL: &str = "sonnet";

/// Conservative token budget used for compaction decisions
pub const DEFAULT_EFFECTIVE_CONTEXT_LIMIT: u64 = 80_000;

/// Usage percentage at which auto-compaction is flagged
pub const DEFAULT_AUTO_COMPACT_THRESHOLD_PERCENT: f64 = 85.0;

// ============================================================================
// Agent Settings
// ============================================================================

/// Settings applied to every agent process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentSettings {
    /// Path to the agent CLI; resolved from `PATH` when unset
    pub cli_path: Option<PathBuf>,
    /// Root of the note vault, used as the process working directory
    pub vault_root: PathBuf,
    /// Model used for sessions without a locked model
    pub default_model: String,
    /// Permission mode passed to the CLI
    pub permission_mode: PermissionMode,
    /// Optional capabilities the agent may use
    pub permissions: AgentPermissions,
    /// Extra environment variables for the CLI process
    pub env: HashMap<String, String>,
    /// Whether crossing the threshold schedules a compaction
    pub auto_compact: bool,
    /// Token budget used for the usage percentage
    pub effective_context_limit: u64,
    /// Usage percentage at which auto-compaction is flagged
    pub auto_compact_threshold_percent: f64,
}

impl AgentSettings {
    /// Create a new builder for `AgentSettings`
    #[must_use]
    pub fn builder() -> AgentSettingsBuilder {
        AgentSettingsBuilder::default()
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            cli_path: None,
            vault_root: PathBuf::from("."),
            default_model: DEFAULT_MODEL.to_string(),
            permission_mode: PermissionMode::default(),
            permissions: AgentPermissions::default(),
            env: HashMap::new(),
            auto_compact: true,
            effective_context_limit: DEFAULT_EFFECTIVE_CONTEXT_LIMIT,
            auto_compact_threshold_percent: DEFAULT_AUTO_COMPACT_THRESHOLD_PERCENT,
        }
    }
}

// ============================================================================
// Builder for AgentSettings
// ============================================================================

/// Builder for `AgentSettings`
#[derive(Debug, Default)]
pub struct AgentSettingsBuilder {
    settings: AgentSettings,
}

impl AgentSettingsBuilder {
    /// Set the CLI path
    #[must_use]
    pub fn cli_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.cli_path = Some(path.into());
        self
    }

    /// Set the vault root
    #[must_use]
    pub fn vault_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.vault_root = path.into();
        self
    }

    /// Set the default model
    #[must_use]
    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.settings.default_model = model.into();
        self
    }

    /// Set permission mode
    #[must_use]
    pub const fn permission_mode(mut self, mode: PermissionMode) -> Self {
        self.settings.permission_mode = mode;
        self
    }

    /// Set the enabled optional capabilities
    #[must_use]
    pub const fn permissions(mut self, permissions: AgentPermissions) -> Self {
        self.settings.permissions = permissions;
        self
    }

    /// Add an environment variable for the CLI process
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.env.insert(key.into(), value.into());
        self
    }

    /// Enable or disable auto-compaction
    #[must_use]
    pub const fn auto_compact(mut self, enabled: bool) -> Self {
        self.settings.auto_compact = enabled;
        self
    }

    /// Set the effective context limit
    ///
    /// # Panics
    /// Panics if `limit` is zero
    #[must_use]
    pub fn effective_context_limit(mut self, limit: u64) -> Self {
        assert!(limit > 0, "effective_context_limit must be positive");
        self.settings.effective_context_limit = limit;
        self
    }

    /// Set the auto-compaction threshold percentage
    ///
    /// # Panics
    /// Panics if `percent` is outside `(0, 100]`
    #[must_use]
    pub fn auto_compact_threshold_percent(mut self, percent: f64) -> Self {
        assert!(
            percent > 0.0 && percent <= 100.0,
            "auto_compact_threshold_percent {percent} must be in (0, 100]"
        );
        self.settings.auto_compact_threshold_percent = percent;
        self
    }

    /// Build the settings
    #[must_use]
    pub fn build(self) -> AgentSettings {
        self.settings
    }
}
