//! Session-tagged event multiplexer
//!
//! Every event the chat layer produces is a [`SessionEvent`]: a typed
//! [`EventKind`] tagged with the logical session it belongs to. Events are
//! published through one [`EventBus`], and each subscriber has to declare up
//! front whether it only wants the foreground session's events (live
//! rendering) or every session's events (persistence, badges, notifications).
//!
//! Whether an event is foreground is decided when it is published, not when
//! it is received, so switching sessions never re-labels events already in
//! flight.

use std::sync::Arc;

use futures::Stream;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::types::identifiers::{ResumeToken, SessionId};
use crate::types::messages::CompactTrigger;
use crate::types::session::{ChatMessage, ToolInvocation};

/// Capacity of the broadcast ring shared by all subscribers
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Exit code reported when the process was killed by a signal
pub const SIGNAL_EXIT_CODE: i32 = -1;

// ============================================================================
// Event Types
// ============================================================================

/// Token counters carried by a context update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    /// Cumulative input tokens
    pub input_tokens: u64,
    /// Cumulative output tokens
    pub output_tokens: u64,
    /// Cumulative cache-read tokens
    pub cache_read_tokens: u64,
    /// Nominal context window of the model
    pub context_window: u64,
}

/// Turn-level metadata from a result record
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResult {
    /// Result subtype
    pub subtype: Option<String>,
    /// Whether the turn failed
    pub is_error: bool,
    /// Human-readable result text
    pub text: Option<String>,
    /// Total cost in USD
    pub total_cost_usd: Option<f64>,
    /// Total duration in milliseconds
    pub duration_ms: Option<u64>,
    /// Number of agent turns
    pub num_turns: Option<u32>,
}

/// Typed event payloads
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EventKind {
    /// The agent announced its own session identifier
    Init {
        /// Token for resuming the agent conversation
        resume_token: ResumeToken,
    },
    /// Assistant text so far in the current turn (cumulative, not a delta)
    Streaming {
        /// Full text accumulated in this turn
        text: String,
    },
    /// The agent invoked a tool
    ToolUse {
        /// Recorded invocation
        tool: ToolInvocation,
    },
    /// A finished assistant message was persisted
    Assistant {
        /// Persisted message
        message: ChatMessage,
    },
    /// A turn completed successfully
    Result {
        /// Result metadata
        result: TurnResult,
    },
    /// A turn or process failed
    Error {
        /// Human-readable error
        error: String,
    },
    /// The process exited; input can be re-enabled
    Complete {
        /// Exit code, [`SIGNAL_EXIT_CODE`] when killed by a signal
        code: i32,
        /// Whether the exit followed an abort request
        aborted: bool,
    },
    /// Cumulative usage counters reported by the agent
    ContextUpdate {
        /// Latest counters
        usage: UsageSnapshot,
    },
    /// The conversation context was compacted
    Compact {
        /// Trigger source
        trigger: CompactTrigger,
        /// Token count before compaction
        pre_tokens: u64,
    },
    /// The provider's usage limit was hit
    RateLimitError {
        /// When the limit resets, if the agent said so
        reset_time: Option<String>,
        /// Agent-provided message
        message: String,
    },
}

/// Named event channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventChannel {
    /// `init`
    Init,
    /// `streaming`
    Streaming,
    /// `toolUse`
    ToolUse,
    /// `assistant`
    Assistant,
    /// `result`
    Result,
    /// `error`
    Error,
    /// `complete`
    Complete,
    /// `contextUpdate`
    ContextUpdate,
    /// `compact`
    Compact,
    /// `rateLimitError`
    RateLimitError,
}

impl EventChannel {
    /// Channel name as seen by the UI
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Streaming => "streaming",
            Self::ToolUse => "toolUse",
            Self::Assistant => "assistant",
            Self::Result => "result",
            Self::Error => "error",
            Self::Complete => "complete",
            Self::ContextUpdate => "contextUpdate",
            Self::Compact => "compact",
            Self::RateLimitError => "rateLimitError",
        }
    }
}

impl EventKind {
    /// Channel this payload is published on
    #[must_use]
    pub const fn channel(&self) -> EventChannel {
        match self {
            Self::Init { .. } => EventChannel::Init,
            Self::Streaming { .. } => EventChannel::Streaming,
            Self::ToolUse { .. } => EventChannel::ToolUse,
            Self::Assistant { .. } => EventChannel::Assistant,
            Self::Result { .. } => EventChannel::Result,
            Self::Error { .. } => EventChannel::Error,
            Self::Complete { .. } => EventChannel::Complete,
            Self::ContextUpdate { .. } => EventChannel::ContextUpdate,
            Self::Compact { .. } => EventChannel::Compact,
            Self::RateLimitError { .. } => EventChannel::RateLimitError,
        }
    }
}

/// An event tagged with its owning session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
    /// Owning session
    pub session_id: SessionId,
    /// Payload
    #[serde(flatten)]
    pub kind: EventKind,
}

impl SessionEvent {
    /// Create a new session event
    pub fn new(session_id: impl Into<SessionId>, kind: EventKind) -> Self {
        Self {
            session_id: session_id.into(),
            kind,
        }
    }

    /// Channel this event is published on
    #[must_use]
    pub const fn channel(&self) -> EventChannel {
        self.kind.channel()
    }

    /// Whether this is the process-exit event
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self.kind, EventKind::Complete { .. })
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Which sessions a subscription receives events for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionScope {
    /// Only events for the session displayed when the event was published
    Foreground,
    /// Events for every session
    AllSessions,
}

#[derive(Debug, Clone)]
struct Envelope {
    event: SessionEvent,
    foreground: bool,
}

/// Broadcast point for session events
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Envelope>,
    active: Arc<RwLock<Option<SessionId>>>,
}

impl EventBus {
    /// Create a bus with the default capacity
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(EVENT_CHANNEL_CAPACITY)
    }

    /// Create a bus with a custom broadcast capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            active: Arc::new(RwLock::new(None)),
        }
    }

    /// Mark which session is currently displayed
    pub fn set_active_session(&self, session_id: Option<SessionId>) {
        *self.active.write() = session_id;
    }

    /// Currently displayed session
    #[must_use]
    pub fn active_session(&self) -> Option<SessionId> {
        self.active.read().clone()
    }

    /// Whether `session_id` is the displayed session
    #[must_use]
    pub fn is_foreground(&self, session_id: &SessionId) -> bool {
        self.active.read().as_ref() == Some(session_id)
    }

    /// Publish an event to every subscriber whose scope accepts it
    ///
    /// Returns the number of live subscriptions; publishing with none is fine.
    pub fn publish(&self, event: SessionEvent) -> usize {
        let foreground = self.is_foreground(&event.session_id);
        log::trace!(
            "[{}] publish {} (foreground: {foreground})",
            event.session_id,
            event.channel().name()
        );
        self.tx.send(Envelope { event, foreground }).unwrap_or(0)
    }

    /// Subscribe with an explicit scope
    #[must_use]
    pub fn subscribe(&self, scope: SubscriptionScope) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            scope,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A scoped receiver of session events
pub struct Subscription {
    rx: broadcast::Receiver<Envelope>,
    scope: SubscriptionScope,
}

impl Subscription {
    /// Scope declared at subscription time
    #[must_use]
    pub const fn scope(&self) -> SubscriptionScope {
        self.scope
    }

    const fn accepts(&self, envelope: &Envelope) -> bool {
        match self.scope {
            SubscriptionScope::AllSessions => true,
            SubscriptionScope::Foreground => envelope.foreground,
        }
    }

    /// Wait for the next accepted event; `None` once the bus is gone
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.rx.recv().await {
                Ok(envelope) if self.accepts(&envelope) => return Some(envelope.event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("Event subscriber lagged, {skipped} event(s) dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next accepted event that is already queued
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(envelope) if self.accepts(&envelope) => return Some(envelope.event),
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    log::warn!("Event subscriber lagged, {skipped} event(s) dropped");
                }
                Err(_) => return None,
            }
        }
    }

    /// Drain every queued accepted event
    pub fn drain(&mut self) -> Vec<SessionEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Convert into a `Stream` of accepted events
    pub fn into_stream(mut self) -> impl Stream<Item = SessionEvent> + Send {
        async_stream::stream! {
            while let Some(event) = self.recv().await {
                yield event;
            }
        }
    }
}
