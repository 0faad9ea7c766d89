//! Stream record type definitions
//!
//! This module contains the records the agent CLI writes, one JSON object per
//! line, when run with `--output-format stream-json`. Only the fields the chat
//! layer consumes are modelled; everything else is ignored on decode.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::identifiers::ResumeToken;

// ============================================================================
// Content Blocks
// ============================================================================

/// Content block types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Text content block
    Text {
        /// Text content
        text: String,
    },
    /// Thinking content block (extended thinking)
    Thinking {
        /// Thinking content
        thinking: String,
    },
    /// Tool use request
    ToolUse {
        /// Tool use ID
        id: String,
        /// Tool name
        name: String,
        /// Tool input parameters
        #[serde(default)]
        input: serde_json::Value,
    },
    /// Tool execution result
    ToolResult {
        /// ID of the tool use this is a result for
        tool_use_id: String,
        /// Whether this is an error result
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
    /// Any block kind the chat layer does not consume
    #[serde(other)]
    Other,
}

/// Conversation content can be a plain string or structured blocks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConversationContent {
    /// Plain string content
    String(String),
    /// Structured content blocks
    Blocks(Vec<ContentBlock>),
}

impl ConversationContent {
    /// Content blocks in order; plain strings become a single text block
    #[must_use]
    pub fn blocks(&self) -> Vec<ContentBlock> {
        match self {
            Self::String(text) => vec![ContentBlock::Text { text: text.clone() }],
            Self::Blocks(blocks) => blocks.clone(),
        }
    }
}

/// Body of an assistant or user record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Message role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Message content
    pub content: ConversationContent,
}

// ============================================================================
// Usage and Metadata
// ============================================================================

/// Cumulative token counters reported by the agent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Input tokens
    #[serde(default)]
    pub input_tokens: u64,
    /// Output tokens
    #[serde(default)]
    pub output_tokens: u64,
    /// Tokens served from the prompt cache
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

/// Per-model usage entry of a result record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelUsage {
    /// Nominal context window of the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u64>,
}

/// What started a compaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompactTrigger {
    /// Requested by the user
    Manual,
    /// Started because the context budget ran low
    Auto,
}

impl CompactTrigger {
    /// Wire name of the trigger
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Auto => "auto",
        }
    }
}

/// Metadata attached to a `compact_boundary` system record
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CompactMetadata {
    /// Trigger source
    pub trigger: CompactTrigger,
    /// Token count before the agent compacted
    #[serde(default)]
    pub pre_tokens: u64,
}

// ============================================================================
// Stream Records
// ============================================================================

/// One line of the agent's structured output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamRecord {
    /// System record (`init`, `compact_boundary`, hooks, ...)
    System {
        /// System record subtype
        subtype: String,
        /// Agent-side session identifier
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<ResumeToken>,
        /// Present on `compact_boundary` records
        #[serde(default, skip_serializing_if = "Option::is_none")]
        compact_metadata: Option<CompactMetadata>,
    },
    /// Assistant conversational record
    Assistant {
        /// Message body
        message: ConversationMessage,
        /// Parent tool use ID for nested (sub-agent) conversations
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_tool_use_id: Option<String>,
    },
    /// User conversational record (usually tool results)
    User {
        /// Message body
        message: ConversationMessage,
    },
    /// Turn-level result record
    Result {
        /// Result subtype (`success`, `error_max_turns`, ...)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subtype: Option<String>,
        /// Whether the turn failed
        #[serde(default)]
        is_error: bool,
        /// Human-readable result text
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
        /// Cumulative token usage
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
        /// Per-model usage, keyed by model id
        #[serde(
            default,
            rename = "modelUsage",
            skip_serializing_if = "Option::is_none"
        )]
        model_usage: Option<HashMap<String, ModelUsage>>,
        /// Total cost in USD
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total_cost_usd: Option<f64>,
        /// Total duration in milliseconds
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
        /// Number of conversation turns
        #[serde(default, skip_serializing_if = "Option::is_none")]
        num_turns: Option<u32>,
        /// Agent-side session identifier
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<ResumeToken>,
    },
    /// Record kinds the chat layer does not consume (`stream_event`, ...)
    #[serde(other)]
    Unknown,
}
