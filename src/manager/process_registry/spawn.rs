//! Turn spawning logic
//!
//! Handles starting an agent process for a session and wiring it to a
//! background driver.

use tokio_util::sync::CancellationToken;

use crate::error::{ChatError, Result};
use crate::events::{EventKind, SIGNAL_EXIT_CODE, SessionEvent};
use crate::protocol::PendingMessage;
use crate::transport::{AgentInvocation, spawn_agent};
use crate::types::identifiers::{ResumeToken, SessionId};

use super::super::background::{DriverContext, spawn_process_driver};
use super::super::session::ProcessHandle;
use super::core::ProcessRegistry;

// ============================================================================
// REQUEST TYPES
// ============================================================================

/// Request parameters for one agent turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    /// Session the turn belongs to
    pub session_id: SessionId,
    /// Prompt text
    pub prompt: String,
    /// Agent conversation to continue, if any
    pub resume_token: Option<ResumeToken>,
    /// Model identifier
    pub model: String,
}

// ============================================================================
// SPAWN IMPLEMENTATION
// ============================================================================

impl ProcessRegistry {
    /// Start an agent turn for a session
    ///
    /// Spawns the CLI in the vault directory with the current permission
    /// settings and registers a process handle. Spawn failures do not return
    /// an error: they are reported as an `Error` event followed by `Complete`,
    /// so the caller's input handling stays on the event path.
    ///
    /// # Errors
    /// Returns [`ChatError::SessionBusy`] if the session already has a live
    /// process. Callers are expected to check [`Self::is_running`] first.
    pub fn send_message(&self, request: SendRequest) -> Result<()> {
        let SendRequest {
            session_id,
            prompt,
            resume_token,
            model,
        } = request;

        let mut state = self.state.lock();
        if state.handles.contains_key(&session_id) {
            return Err(ChatError::session_busy(session_id));
        }

        let invocation = AgentInvocation {
            prompt,
            model,
            resume_token,
        };
        let settings = self.settings();

        let process = match spawn_agent(&settings, &invocation) {
            Ok(process) => process,
            Err(e) => {
                drop(state);
                log::error!("[{session_id}] {e}");
                self.emit(&session_id, EventKind::Error {
                    error: e.to_string(),
                });
                self.emit(&session_id, EventKind::Complete {
                    code: SIGNAL_EXIT_CODE,
                    aborted: false,
                });
                return Ok(());
            }
        };

        let cancel = CancellationToken::new();
        state.handles.insert(
            session_id.clone(),
            ProcessHandle::new(session_id.clone(), cancel.clone()),
        );
        state
            .pending
            .insert(session_id.clone(), PendingMessage::default());
        drop(state);

        log::info!(
            "[{session_id}] Started agent turn (model {}, resume: {})",
            invocation.model,
            invocation.resume_token.is_some()
        );

        spawn_process_driver(
            process,
            DriverContext {
                session_id,
                state: self.state.clone(),
                events_tx: self.events_tx.clone(),
                cancel,
            },
        );

        Ok(())
    }

    fn emit(&self, session_id: &SessionId, kind: EventKind) {
        if self
            .events_tx
            .send(SessionEvent::new(session_id, kind))
            .is_err()
        {
            log::debug!("[{session_id}] Event inbox closed, dropping event");
        }
    }
}
