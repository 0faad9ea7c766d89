//! Process handle structures
//!
//! Defines the runtime-only state tracked for each live agent process. None
//! of this is persisted.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::protocol::PendingMessage;
use crate::types::identifiers::{ResumeToken, SessionId};

/// Lifecycle of a session's agent process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// No process registered
    Idle,
    /// Process running
    Running,
    /// Termination requested, exit not yet observed
    Aborting,
}

/// Live process registered for a session
pub(super) struct ProcessHandle {
    /// Owning session
    pub session_id: SessionId,

    /// Cancelled to request termination
    pub cancel: CancellationToken,

    /// Whether an abort has been requested
    pub aborting: bool,

    /// When the process was spawned
    pub started_at: DateTime<Utc>,
}

impl ProcessHandle {
    pub(super) fn new(session_id: SessionId, cancel: CancellationToken) -> Self {
        Self {
            session_id,
            cancel,
            aborting: false,
            started_at: Utc::now(),
        }
    }

    pub(super) const fn status(&self) -> ProcessStatus {
        if self.aborting {
            ProcessStatus::Aborting
        } else {
            ProcessStatus::Running
        }
    }
}

/// State shared between the registry and its process driver tasks
#[derive(Default)]
pub(super) struct RegistryState {
    /// At most one live handle per session
    pub handles: HashMap<SessionId, ProcessHandle>,

    /// In-flight assistant turn per session
    ///
    /// Kept apart from the handle so the turn can still be materialised after
    /// the process has exited and its handle is gone.
    pub pending: HashMap<SessionId, PendingMessage>,

    /// Resume token from the most recent init record per session
    pub resume_tokens: HashMap<SessionId, ResumeToken>,
}
