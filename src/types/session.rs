//! Persisted chat session types
//!
//! A [`Session`] is the durable record of one conversation. It is written to
//! the host's document store after every structural change, so every field
//! here is part of the persisted shape (camelCase keys).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identifiers::{MessageId, ResumeToken, SessionId};

/// Maximum length of a title derived from the first prompt
const TITLE_MAX_CHARS: usize = 50;

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person typing into the chat
    User,
    /// The agent
    Assistant,
}

impl Role {
    /// Lowercase role name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A capability the agent exercised during a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    /// Tool use ID assigned by the agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Tool name (`Read`, `Edit`, `Grep`, `WebSearch`, ...)
    pub name: String,
    /// Opaque tool input payload
    #[serde(default)]
    pub input: serde_json::Value,
}

/// Line/column position inside a note
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPosition {
    /// Zero-based line
    pub line: u32,
    /// Zero-based column
    pub ch: u32,
}

/// Editor selection captured with a prompt, used to replace or append later
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionContext {
    /// Vault-relative path of the note
    pub file_path: String,
    /// Selected text at capture time
    pub selected_text: String,
    /// Selection start
    pub start: TextPosition,
    /// Selection end
    pub end: TextPosition,
}

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Message identifier
    pub id: MessageId,
    /// Speaker
    pub role: Role,
    /// Text content; may be empty for tool-only assistant turns
    pub content: String,
    /// When the message was recorded
    pub timestamp: DateTime<Utc>,
    /// Tool invocations made while producing this message, in order
    #[serde(default, rename = "thinkingSteps", skip_serializing_if = "Vec::is_empty")]
    pub tool_steps: Vec<ToolInvocation>,
    /// Editor selection the prompt referred to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<SelectionContext>,
}

impl ChatMessage {
    /// Create a user message
    pub fn user(content: impl Into<String>, selection: Option<SelectionContext>) -> Self {
        Self {
            id: MessageId::generate(),
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            tool_steps: Vec::new(),
            selection,
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>, tool_steps: Vec<ToolInvocation>) -> Self {
        Self {
            id: MessageId::generate(),
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            tool_steps,
            selection: None,
        }
    }
}

/// Per-session token accounting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStats {
    /// Cumulative input tokens
    pub input_tokens: u64,
    /// Cumulative output tokens
    pub output_tokens: u64,
    /// Cumulative cache-read tokens
    pub cache_read_tokens: u64,
    /// Nominal context window of the model
    pub context_window: u64,
    /// Compactions performed on this session
    #[serde(default)]
    pub compaction_count: u32,
    /// Token total before the most recent compaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_compaction_pre_tokens: Option<u64>,
}

impl TokenStats {
    /// Tokens counted against the context budget
    #[must_use]
    pub const fn used_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    /// Zero the counters after a compaction, keeping the compaction history
    pub fn reset_after_compaction(&mut self, pre_tokens: u64) {
        *self = Self {
            compaction_count: self.compaction_count.saturating_add(1),
            last_compaction_pre_tokens: Some(pre_tokens),
            context_window: self.context_window,
            ..Self::default()
        };
    }
}

/// A persisted conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session identifier
    pub id: SessionId,
    /// Agent-side token for `--resume`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_token: Option<ResumeToken>,
    /// Messages in conversation order
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Display title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Model locked in after the first message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_model: Option<String>,
    /// Token accounting, absent until the first usage report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_stats: Option<TokenStats>,
    /// Compaction summary to prepend to the next outgoing prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_summary: Option<String>,
}

impl Session {
    /// Create an empty session with a fresh identifier
    #[must_use]
    pub fn new() -> Self {
        Self::with_id(SessionId::generate())
    }

    /// Create an empty session with the given identifier
    pub fn with_id(id: impl Into<SessionId>) -> Self {
        Self {
            id: id.into(),
            resume_token: None,
            messages: Vec::new(),
            created_at: Utc::now(),
            title: None,
            locked_model: None,
            token_stats: None,
            pending_summary: None,
        }
    }

    /// Append a message, deriving a title from the first user prompt
    pub fn push_message(&mut self, message: ChatMessage) {
        if self.title.is_none() && message.role == Role::User {
            let title: String = message.content.trim().chars().take(TITLE_MAX_CHARS).collect();
            if !title.is_empty() {
                self.title = Some(title);
            }
        }
        self.messages.push(message);
    }

    /// All messages rendered as `role: content` paragraphs
    #[must_use]
    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str(), m.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Token total counted against the context budget
    #[must_use]
    pub fn used_tokens(&self) -> u64 {
        self.token_stats.as_ref().map_or(0, TokenStats::used_tokens)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
