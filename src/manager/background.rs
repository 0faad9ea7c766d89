//! Background task driving one agent process
//!
//! The driver owns the child process and its decoder. It forwards decoded
//! events, in the order the agent wrote them, into the controller's inbox and
//! always finishes with exactly one `Complete` event.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::session::RegistryState;
use crate::events::{EventKind, SIGNAL_EXIT_CODE, SessionEvent};
use crate::protocol::ProtocolDecoder;
use crate::transport::AgentProcess;
use crate::transport::subprocess::{READ_CHUNK_SIZE, spawn_stderr_collector};
use crate::types::identifiers::SessionId;

/// Shared state for a process driver task
pub(super) struct DriverContext {
    pub session_id: SessionId,
    pub state: Arc<Mutex<RegistryState>>,
    pub events_tx: mpsc::UnboundedSender<SessionEvent>,
    pub cancel: CancellationToken,
}

impl DriverContext {
    fn emit(&self, kind: EventKind) {
        let event = SessionEvent::new(&self.session_id, kind);
        if self.events_tx.send(event).is_err() {
            log::debug!("[{}] Event inbox closed, dropping event", self.session_id);
        }
    }

    /// Decode a chunk against this session's pending message
    fn decode(&self, decoder: &mut ProtocolDecoder, chunk: Option<&[u8]>) -> Vec<EventKind> {
        let mut state = self.state.lock();
        let pending = state.pending.entry(self.session_id.clone()).or_default();
        let events = match chunk {
            Some(bytes) => decoder.feed(bytes, pending),
            None => decoder.finish(pending),
        };

        for event in &events {
            if let EventKind::Init { resume_token } = event {
                log::debug!("[{}] Agent session {}", self.session_id, resume_token);
                state
                    .resume_tokens
                    .insert(self.session_id.clone(), resume_token.clone());
            }
        }
        events
    }

    fn kill(&self, child: &mut Child) {
        log::info!("[{}] Killing agent process", self.session_id);
        if let Err(e) = child.start_kill() {
            log::warn!("[{}] Failed to signal agent process: {}", self.session_id, e);
        }
    }

    /// Emit decoded events; returns whether a turn outcome was among them
    fn dispatch(&self, events: Vec<EventKind>) -> bool {
        let mut saw_outcome = false;
        for kind in events {
            saw_outcome |= matches!(
                kind,
                EventKind::Result { .. } | EventKind::Error { .. } | EventKind::RateLimitError { .. }
            );
            self.emit(kind);
        }
        saw_outcome
    }
}

/// Spawn a background task that drives an agent process to completion
///
/// This task owns the child process and handles:
/// - Reading stdout in chunks and decoding records
/// - Killing the process when the handle's token is cancelled, even after
///   its output has closed
/// - Reporting unexpected exits with the stderr tail
/// - Unregistering the handle, then emitting `Complete`
pub(super) fn spawn_process_driver(process: AgentProcess, ctx: DriverContext) {
    tokio::spawn(async move {
        let AgentProcess {
            mut child,
            mut stdout,
            stderr,
        } = process;
        let stderr_task = spawn_stderr_collector(stderr, ctx.session_id.clone());
        let mut decoder = ProtocolDecoder::new();
        let mut buffer = vec![0u8; READ_CHUNK_SIZE];
        let mut aborted = false;
        let mut saw_outcome = false;

        loop {
            tokio::select! {
                () = ctx.cancel.cancelled() => {
                    aborted = true;
                    ctx.kill(&mut child);
                    break;
                }
                read = stdout.read(&mut buffer) => match read {
                    Ok(0) => {
                        let events = ctx.decode(&mut decoder, None);
                        saw_outcome |= ctx.dispatch(events);
                        break;
                    }
                    Ok(n) => {
                        let events = ctx.decode(&mut decoder, Some(&buffer[..n]));
                        saw_outcome |= ctx.dispatch(events);
                    }
                    Err(e) => {
                        log::error!("[{}] Failed to read agent output: {}", ctx.session_id, e);
                        ctx.emit(EventKind::Error {
                            error: format!("Failed to read agent output: {e}"),
                        });
                        saw_outcome = true;
                        ctx.kill(&mut child);
                        break;
                    }
                }
            }
        }

        // Output may close long before the process exits; abort still has to land
        let waited = if aborted {
            child.wait().await
        } else {
            tokio::select! {
                status = child.wait() => status,
                () = ctx.cancel.cancelled() => {
                    aborted = true;
                    ctx.kill(&mut child);
                    child.wait().await
                }
            }
        };

        let (code, success) = match waited {
            Ok(status) => (status.code().unwrap_or(SIGNAL_EXIT_CODE), status.success()),
            Err(e) => {
                log::error!("[{}] Failed to wait for agent process: {}", ctx.session_id, e);
                (SIGNAL_EXIT_CODE, false)
            }
        };

        if aborted {
            stderr_task.abort();
        }
        let stderr_tail = stderr_task.await.unwrap_or_default();

        if !success && !aborted && !saw_outcome {
            let error = if stderr_tail.is_empty() {
                format!("Agent exited unexpectedly with code {code}")
            } else {
                stderr_tail
            };
            ctx.emit(EventKind::Error { error });
        }

        ctx.state.lock().handles.remove(&ctx.session_id);
        log::info!(
            "[{}] Agent process exited (code {}, aborted: {})",
            ctx.session_id,
            code,
            aborted
        );
        ctx.emit(EventKind::Complete { code, aborted });
    });
}
