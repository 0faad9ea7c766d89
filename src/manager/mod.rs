//! Agent process management
//!
//! Provides `ProcessRegistry` for spawning, tracking and aborting one agent
//! process per chat session.
//!
//! # Module Structure
//!
//! - `process_registry` - Core `ProcessRegistry` with public API
//! - `session` - Process handle structures
//! - `background` - Per-process driver task

mod background;
mod process_registry;
mod session;

pub use process_registry::{ProcessRegistry, SendRequest};
pub use session::ProcessStatus;
