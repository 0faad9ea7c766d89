//! Type definitions for the vault chat agent
//!
//! This module contains all the type definitions used throughout the crate,
//! organized into logical submodules:
//!
//! - [`identifiers`] - Type-safe ID wrappers (`SessionId`, `ResumeToken`, `MessageId`)
//! - [`permissions`] - Permission mode and toggleable capabilities
//! - [`messages`] - Stream records written by the agent CLI
//! - [`session`] - Persisted sessions, messages and token stats
//! - [`options`] - Agent settings

pub mod identifiers;
pub mod messages;
pub mod options;
pub mod permissions;
pub mod session;

// Re-export commonly used types
pub use identifiers::{MessageId, ResumeToken, SessionId};
pub use messages::{CompactTrigger, ContentBlock, StreamRecord, Usage};
pub use options::{AgentSettings, AgentSettingsBuilder};
pub use permissions::{AgentPermissions, PermissionMode};
pub use session::{
    ChatMessage, Role, SelectionContext, Session, TextPosition, TokenStats, ToolInvocation,
};
