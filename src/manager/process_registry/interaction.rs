//! Process termination
//!
//! Abort is best-effort: it only requests termination. The process driver
//! observes the exit and emits the session's `Complete` event.

use crate::types::identifiers::SessionId;

use super::core::ProcessRegistry;

impl ProcessRegistry {
    /// Request termination of the session's process
    ///
    /// Returns `false`, and emits nothing, when no process is running.
    pub fn abort(&self, session_id: &SessionId) -> bool {
        let mut state = self.state.lock();
        let Some(handle) = state.handles.get_mut(session_id) else {
            return false;
        };

        if !handle.aborting {
            log::info!("[{}] Abort requested", handle.session_id);
            handle.aborting = true;
            handle.cancel.cancel();
        }
        true
    }

    /// Request termination of every registered process
    ///
    /// Returns how many processes were signalled.
    pub fn abort_all(&self) -> usize {
        let mut state = self.state.lock();
        let mut count = 0;
        for handle in state.handles.values_mut() {
            if !handle.aborting {
                handle.aborting = true;
                handle.cancel.cancel();
            }
            count += 1;
        }
        count
    }

    /// Abort everything so no agent process outlives the host
    pub fn shutdown(&self) {
        log::info!("Shutting down ProcessRegistry...");
        let count = self.abort_all();
        log::info!("ProcessRegistry shutdown complete ({count} process(es) aborted)");
    }
}
