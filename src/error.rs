//! Error types for the vault chat agent

use thiserror::Error;

use crate::types::identifiers::SessionId;

/// Main error type for the vault chat agent
#[derive(Error, Debug)]
pub enum ChatError {
    /// Agent CLI not found or not installed
    #[error("Agent CLI not found: {0}")]
    CliNotFound(String),

    /// The agent process could not be started
    #[error("Failed to start agent process: {0}")]
    Spawn(String),

    /// A process is already registered for the session
    #[error("Session {0} already has a running agent process")]
    SessionBusy(SessionId),

    /// Chat session not found in the store
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted state could not be read or written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The controller loop has shut down
    #[error("Chat controller is closed")]
    Closed,
}

/// Result type alias for chat agent operations
pub type Result<T> = std::result::Result<T, ChatError>;

impl ChatError {
    /// Create a CLI not found error
    #[must_use]
    pub fn cli_not_found() -> Self {
        Self::CliNotFound(
            "Claude Code not found. Install with:\n\
             npm install -g @anthropic-ai/claude-code\n\
             \n\
             Or set the CLI path in the agent settings"
                .to_string(),
        )
    }

    /// Create a spawn error
    pub fn spawn(msg: impl Into<String>) -> Self {
        Self::Spawn(msg.into())
    }

    /// Create a session busy error
    pub fn session_busy(session_id: impl Into<SessionId>) -> Self {
        Self::SessionBusy(session_id.into())
    }

    /// Create a session not found error
    pub fn session_not_found(session_id: impl Into<SessionId>) -> Self {
        Self::SessionNotFound(session_id.into())
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
