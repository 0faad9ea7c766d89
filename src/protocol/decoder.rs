//! Incremental decoder for the agent's line-delimited output
//!
//! Output arrives in arbitrary chunks. The decoder keeps the unterminated
//! tail of the previous chunk, flushes every complete line, and translates
//! each parsed record into [`EventKind`]s while accumulating the turn's
//! text and tool steps into a [`PendingMessage`].

use crate::events::{EventKind, TurnResult, UsageSnapshot};
use crate::types::messages::{ContentBlock, StreamRecord, Usage};
use crate::types::session::{ChatMessage, ToolInvocation};

use super::rate_limit::detect_rate_limit;

/// Context window assumed when the agent does not report one
pub const DEFAULT_CONTEXT_WINDOW: u64 = 200_000;

/// Default maximum size of a single line (1MB)
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Separator between text blocks of one turn
const TEXT_BLOCK_SEPARATOR: &str = "\n\n";

// ============================================================================
// Pending Message
// ============================================================================

/// Text and tool steps accumulated for the in-flight assistant turn
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingMessage {
    /// Text so far
    pub text: String,
    /// Tool steps so far, in invocation order
    pub tools: Vec<ToolInvocation>,
}

impl PendingMessage {
    /// Whether nothing has been accumulated
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.tools.is_empty()
    }

    fn push_text(&mut self, text: &str) {
        if !self.text.is_empty() {
            self.text.push_str(TEXT_BLOCK_SEPARATOR);
        }
        self.text.push_str(text);
    }

    /// Build the final assistant message
    ///
    /// `fallback_text` (the result record's text) is used when no text was
    /// streamed. Returns `None` when there is nothing worth persisting.
    #[must_use]
    pub fn into_message(self, fallback_text: Option<&str>) -> Option<ChatMessage> {
        let text = if self.text.is_empty() {
            fallback_text.unwrap_or_default().to_string()
        } else {
            self.text
        };
        if text.is_empty() && self.tools.is_empty() {
            return None;
        }
        Some(ChatMessage::assistant(text, self.tools))
    }
}

// ============================================================================
// Protocol Decoder
// ============================================================================

/// Line-buffered stream-json decoder for one process
#[derive(Debug)]
pub struct ProtocolDecoder {
    partial: Vec<u8>,
    max_line_bytes: usize,
    discarding: bool,
}

impl ProtocolDecoder {
    /// Create a decoder with the default line limit
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_line_bytes(DEFAULT_MAX_LINE_BYTES)
    }

    /// Create a decoder with a custom line limit
    #[must_use]
    pub fn with_max_line_bytes(max_line_bytes: usize) -> Self {
        Self {
            partial: Vec::new(),
            max_line_bytes,
            discarding: false,
        }
    }

    /// Bytes of the unterminated line currently buffered
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.partial.len()
    }

    /// Append a chunk and decode every line it completes
    pub fn feed(&mut self, chunk: &[u8], pending: &mut PendingMessage) -> Vec<EventKind> {
        let mut events = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|b| *b == b'\n') {
            let (head, tail) = rest.split_at(pos);
            rest = &tail[1..];

            if self.discarding {
                self.discarding = false;
                self.partial.clear();
                continue;
            }

            self.partial.extend_from_slice(head);
            let line = std::mem::take(&mut self.partial);
            events.extend(Self::decode_bytes(&line, pending));
        }

        if !self.discarding {
            self.partial.extend_from_slice(rest);
            if self.partial.len() > self.max_line_bytes {
                log::warn!(
                    "Dropping stream line exceeding {} bytes",
                    self.max_line_bytes
                );
                self.partial.clear();
                self.discarding = true;
            }
        }

        events
    }

    /// Decode whatever remains buffered once the stream has ended
    pub fn finish(&mut self, pending: &mut PendingMessage) -> Vec<EventKind> {
        let line = std::mem::take(&mut self.partial);
        let discarding = std::mem::replace(&mut self.discarding, false);
        if discarding || line.is_empty() {
            return Vec::new();
        }
        Self::decode_bytes(&line, pending)
    }

    fn decode_bytes(line: &[u8], pending: &mut PendingMessage) -> Vec<EventKind> {
        match std::str::from_utf8(line) {
            Ok(text) => decode_line(text, pending),
            Err(e) => {
                log::debug!("Dropping non UTF-8 stream line: {e}");
                Vec::new()
            }
        }
    }
}

impl Default for ProtocolDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode one complete line
///
/// Blank lines, non-JSON noise and unrecognised records yield no events.
pub fn decode_line(line: &str, pending: &mut PendingMessage) -> Vec<EventKind> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<StreamRecord>(line) {
        Ok(record) => translate_record(record, pending),
        Err(e) => {
            log::debug!("Ignoring unparseable stream line ({e}): {line}");
            Vec::new()
        }
    }
}

/// Translate a parsed record into events, updating the pending message
pub fn translate_record(record: StreamRecord, pending: &mut PendingMessage) -> Vec<EventKind> {
    match record {
        StreamRecord::System {
            subtype,
            session_id,
            compact_metadata,
        } => match (subtype.as_str(), session_id, compact_metadata) {
            ("init", Some(token), _) => vec![EventKind::Init {
                resume_token: token,
            }],
            ("compact_boundary", _, Some(meta)) => vec![EventKind::Compact {
                trigger: meta.trigger,
                pre_tokens: meta.pre_tokens,
            }],
            (other, _, _) => {
                log::debug!("Ignoring system record with subtype {other}");
                Vec::new()
            }
        },
        StreamRecord::Assistant {
            message,
            parent_tool_use_id,
        } => {
            let nested = parent_tool_use_id.is_some();
            let mut events = Vec::new();
            for block in message.content.blocks() {
                match block {
                    // Sub-agent prose is not part of the visible answer
                    ContentBlock::Text { text } if !nested && !text.is_empty() => {
                        pending.push_text(&text);
                        events.push(EventKind::Streaming {
                            text: pending.text.clone(),
                        });
                    }
                    ContentBlock::ToolUse { id, name, input } => {
                        let tool = ToolInvocation {
                            id: Some(id),
                            name,
                            input,
                        };
                        pending.tools.push(tool.clone());
                        events.push(EventKind::ToolUse { tool });
                    }
                    _ => {}
                }
            }
            events
        }
        StreamRecord::User { .. } | StreamRecord::Unknown => Vec::new(),
        StreamRecord::Result {
            subtype,
            is_error,
            result,
            usage,
            model_usage,
            total_cost_usd,
            duration_ms,
            num_turns,
            ..
        } => {
            let mut events = Vec::with_capacity(2);

            if let Some(usage) = usage {
                let context_window = model_usage
                    .as_ref()
                    .and_then(|models| models.values().filter_map(|m| m.context_window).max())
                    .unwrap_or(DEFAULT_CONTEXT_WINDOW);
                events.push(EventKind::ContextUpdate {
                    usage: usage_snapshot(usage, context_window),
                });
            }

            let text = result.unwrap_or_default();
            if let Some(notice) = detect_rate_limit(&text, is_error) {
                events.push(EventKind::RateLimitError {
                    reset_time: notice.reset_time,
                    message: notice.message,
                });
            } else if is_error {
                let error = if text.trim().is_empty() {
                    format!(
                        "Agent turn failed ({})",
                        subtype.as_deref().unwrap_or("error")
                    )
                } else {
                    text
                };
                events.push(EventKind::Error { error });
            } else {
                events.push(EventKind::Result {
                    result: TurnResult {
                        subtype,
                        is_error,
                        text: (!text.is_empty()).then_some(text),
                        total_cost_usd,
                        duration_ms,
                        num_turns,
                    },
                });
            }

            events
        }
    }
}

const fn usage_snapshot(usage: Usage, context_window: u64) -> UsageSnapshot {
    UsageSnapshot {
        input_tokens: usage.input_tokens,
        output_tokens: usage.output_tokens,
        cache_read_tokens: usage.cache_read_input_tokens,
        context_window,
    }
}
