#![recursion_limit = "256"]

//! # Vault Chat Agent
//!
//! Multi-session orchestration for a note-vault chat assistant backed by the
//! Claude Code CLI. Each chat session drives its own CLI process; its
//! line-delimited JSON output is decoded into typed events, applied to the
//! persisted session, and published to subscribers that choose between the
//! displayed session and all sessions.
//!
//! ## Quick Start
//!
//! ```no_run
//! use vault_chat_agent::{
//!     AgentSettings, ChatController, JsonFileRepository, SendOptions, SubscriptionScope,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = AgentSettings::builder().vault_root("/notes").build();
//!     let repo = JsonFileRepository::new("/notes/.vault-chat/state.json");
//!     let mut chat = ChatController::open(repo, settings)?;
//!     let mut events = chat.subscribe(SubscriptionScope::Foreground);
//!
//!     let id = chat.create_session()?;
//!     chat.send(&id, "Summarize today's daily note", SendOptions::default())?;
//!
//!     loop {
//!         chat.pump().await;
//!         while let Some(event) = events.try_recv() {
//!             if event.is_complete() {
//!                 return Ok(());
//!             }
//!         }
//!     }
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`protocol`]: Line decoder for the CLI's stream-json output
//! - [`transport`]: Building and spawning the CLI process
//! - [`manager`]: One live process per session, with abort
//! - [`events`]: Session-tagged events and the scoped event bus
//! - [`accounting`]: Context usage, the compaction flag and the usage ledger
//! - [`compaction`]: Summarize-and-restart of a session's agent state
//! - [`store`]: Session list and its persistence
//! - [`chat`]: The controller tying it all together
//! - [`types`]: Identifiers, settings and persisted shapes
//! - [`error`]: Error types
//!
//! ## Error Handling
//!
//! Runtime failures (spawn failures, crashes, agent errors, usage limits) are
//! reported as session-tagged events and never as `Err`. Only precondition
//! violations and persistence failures return [`ChatError`]:
//!
//! ```no_run
//! # use vault_chat_agent::{ChatController, ChatError, SendOptions, SessionId};
//! # fn example(chat: &mut ChatController, id: &SessionId) {
//! match chat.send(id, "Hello", SendOptions::default()) {
//!     Ok(()) => {}
//!     Err(ChatError::SessionBusy(id)) => log::warn!("{id} is still answering"),
//!     Err(e) => log::error!("Error: {e}"),
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod accounting;
pub mod chat;
pub mod compaction;
pub mod error;
pub mod events;
pub mod manager;
pub mod protocol;
pub mod store;
pub mod transport;
pub mod types;

// Re-export commonly used types for external API
pub use accounting::{ContextAccountant, ContextReport, UsageLedger};
pub use chat::{ChatCommand, ChatController, ChatHandle, SendOptions};
pub use compaction::{CompactionController, CompactionOutcome};
pub use error::{ChatError, Result};
pub use events::{
    EventBus, EventChannel, EventKind, SessionEvent, Subscription, SubscriptionScope,
};
pub use manager::{ProcessRegistry, ProcessStatus, SendRequest};
pub use protocol::{PendingMessage, ProtocolDecoder};
pub use store::{JsonFileRepository, MemoryRepository, PersistedState, SessionStore, StateRepository};

// Re-export type submodules for flat public API
pub use types::identifiers::{MessageId, ResumeToken, SessionId};
pub use types::messages::CompactTrigger;
pub use types::options::{AgentSettings, AgentSettingsBuilder};
pub use types::permissions::{AgentPermissions, PermissionMode};
pub use types::session::{ChatMessage, Role, SelectionContext, Session, TokenStats, ToolInvocation};

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
