//! Core process registry structure and lookups
//!
//! Provides the main `ProcessRegistry` struct with initialization, status
//! queries and the pending-message and resume-token accessors.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use crate::events::SessionEvent;
use crate::protocol::PendingMessage;
use crate::types::identifiers::{ResumeToken, SessionId};
use crate::types::options::AgentSettings;

use super::super::session::{ProcessStatus, RegistryState};

// ============================================================================
// PROCESS REGISTRY CORE
// ============================================================================

/// Owner of every live agent process, keyed by chat session
///
/// The `ProcessRegistry` coordinates one agent process per session, handling:
/// - Spawning turns with the current settings
/// - At most one live process per session
/// - Abort of one or all processes
/// - The in-flight message and agent resume token of each session
///
/// Events from every process are forwarded, in order per session, to the
/// inbox given at construction.
pub struct ProcessRegistry {
    pub(super) state: Arc<Mutex<RegistryState>>,
    pub(super) settings: RwLock<AgentSettings>,
    pub(super) events_tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ProcessRegistry {
    /// Create a registry that forwards events to `events_tx`
    #[must_use]
    pub fn new(settings: AgentSettings, events_tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            state: Arc::new(Mutex::new(RegistryState::default())),
            settings: RwLock::new(settings),
            events_tx,
        }
    }

    /// Create a registry together with its event inbox
    #[must_use]
    pub fn with_inbox(settings: AgentSettings) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(settings, tx), rx)
    }

    /// Snapshot of the current settings
    #[must_use]
    pub fn settings(&self) -> AgentSettings {
        self.settings.read().clone()
    }

    /// Replace the settings used for subsequent spawns
    pub fn update_settings(&self, settings: AgentSettings) {
        *self.settings.write() = settings;
    }

    /// Whether a live process is registered for the session
    #[must_use]
    pub fn is_running(&self, session_id: &SessionId) -> bool {
        self.state.lock().handles.contains_key(session_id)
    }

    /// Lifecycle status of the session's process
    #[must_use]
    pub fn status(&self, session_id: &SessionId) -> ProcessStatus {
        self.state
            .lock()
            .handles
            .get(session_id)
            .map_or(ProcessStatus::Idle, |h| h.status())
    }

    /// When the session's live process was spawned
    #[must_use]
    pub fn running_since(&self, session_id: &SessionId) -> Option<DateTime<Utc>> {
        self.state.lock().handles.get(session_id).map(|h| h.started_at)
    }

    /// Sessions with a live process
    #[must_use]
    pub fn running_sessions(&self) -> Vec<SessionId> {
        self.state.lock().handles.keys().cloned().collect()
    }

    /// Text and tool steps accumulated for the session's current turn
    #[must_use]
    pub fn get_pending_message(&self, session_id: &SessionId) -> Option<PendingMessage> {
        self.state.lock().pending.get(session_id).cloned()
    }

    /// Discard the session's accumulated turn
    pub fn clear_pending_message(&self, session_id: &SessionId) {
        self.state.lock().pending.remove(session_id);
    }

    /// Remove and return the session's accumulated turn
    pub fn take_pending_message(&self, session_id: &SessionId) -> Option<PendingMessage> {
        self.state.lock().pending.remove(session_id)
    }

    /// Resume token captured from the session's most recent init record
    #[must_use]
    pub fn get_cli_session_id(&self, session_id: &SessionId) -> Option<ResumeToken> {
        self.state.lock().resume_tokens.get(session_id).cloned()
    }

    /// Seed a resume token, e.g. from persisted state
    pub fn set_cli_session_id(&self, session_id: &SessionId, token: ResumeToken) {
        self.state
            .lock()
            .resume_tokens
            .insert(session_id.clone(), token);
    }

    /// Forget the session's resume token so the next turn starts fresh
    pub fn clear_session(&self, session_id: &SessionId) {
        if self.state.lock().resume_tokens.remove(session_id).is_some() {
            log::debug!("[{session_id}] Cleared agent resume token");
        }
    }
}

impl Drop for ProcessRegistry {
    fn drop(&mut self) {
        let aborted = self.abort_all();
        if aborted > 0 {
            log::debug!("Registry dropped with {aborted} live process(es); aborting");
        }
    }
}
