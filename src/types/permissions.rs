//! Permission-related type definitions
//!
//! This module contains the permission mode passed to the agent CLI and the
//! set of optional capabilities the user can switch off.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ============================================================================
// Permission Types
// ============================================================================

/// Permission modes for tool execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    /// Default mode - CLI prompts for dangerous tools
    Default,
    /// Auto-accept file edits
    #[default]
    AcceptEdits,
    /// Plan mode
    Plan,
    /// Allow all tools (use with caution)
    BypassPermissions,
}

impl PermissionMode {
    /// Value passed to `--permission-mode`
    #[must_use]
    pub const fn as_cli_arg(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AcceptEdits => "acceptEdits",
            Self::Plan => "plan",
            Self::BypassPermissions => "bypassPermissions",
        }
    }
}

bitflags! {
    /// Optional agent capabilities the user can toggle
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AgentPermissions: u8 {
        /// Web search
        const WEB_SEARCH = 0b001;
        /// Fetching arbitrary URLs
        const WEB_FETCH = 0b010;
        /// Delegating to sub-agents
        const TASK = 0b100;
    }
}

impl AgentPermissions {
    /// Agent tool name gated by each permission
    const TOOLS: [(Self, &'static str); 3] = [
        (Self::WEB_SEARCH, "WebSearch"),
        (Self::WEB_FETCH, "WebFetch"),
        (Self::TASK, "Task"),
    ];

    /// Tool names for enabled permissions
    #[must_use]
    pub fn allowed_tools(self) -> Vec<&'static str> {
        Self::TOOLS
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, tool)| *tool)
            .collect()
    }

    /// Tool names for disabled permissions; these must be denied explicitly
    #[must_use]
    pub fn denied_tools(self) -> Vec<&'static str> {
        Self::TOOLS
            .iter()
            .filter(|(flag, _)| !self.contains(*flag))
            .map(|(_, tool)| *tool)
            .collect()
    }
}

impl Default for AgentPermissions {
    fn default() -> Self {
        Self::all()
    }
}

// Persisted as booleans so the settings document stays readable
impl Serialize for AgentPermissions {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("AgentPermissions", 3)?;
        state.serialize_field("webSearch", &self.contains(Self::WEB_SEARCH))?;
        state.serialize_field("webFetch", &self.contains(Self::WEB_FETCH))?;
        state.serialize_field("task", &self.contains(Self::TASK))?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for AgentPermissions {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Helper {
            #[serde(default = "enabled")]
            web_search: bool,
            #[serde(default = "enabled")]
            web_fetch: bool,
            #[serde(default = "enabled")]
            task: bool,
        }

        const fn enabled() -> bool {
            true
        }

        let h = Helper::deserialize(deserializer)?;
        let mut perms = Self::empty();
        perms.set(Self::WEB_SEARCH, h.web_search);
        perms.set(Self::WEB_FETCH, h.web_fetch);
        perms.set(Self::TASK, h.task);
        Ok(perms)
    }
}
