//! Output reading helpers for agent subprocesses

use std::collections::VecDeque;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;

use crate::types::identifiers::SessionId;

use super::config::STDERR_TAIL_LINES;

/// Drain stderr so the child never blocks on a full pipe
///
/// Lines are logged as they arrive. The task resolves to the last
/// [`STDERR_TAIL_LINES`] lines, joined, for failure reports.
pub fn spawn_stderr_collector<R>(stderr: R, session_id: SessionId) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim_end().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    log::debug!("[{session_id}] stderr: {line}");
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                Ok(None) => break,
                Err(e) => {
                    log::warn!("[{session_id}] Failed to read stderr: {e}");
                    break;
                }
            }
        }

        tail.into_iter().collect::<Vec<_>>().join("\n")
    })
}
