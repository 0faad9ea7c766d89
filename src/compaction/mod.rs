//! Conversation compaction
//!
//! A compaction asks the agent, in a separate throwaway session, to summarize
//! the real session's transcript. The real session is only touched once a
//! summary has actually been produced: its resume token is dropped, the
//! summary is queued for the next prompt and its token stats start over.
//! Visible history is never removed.

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::Result;
use crate::events::{EventKind, SessionEvent};
use crate::manager::{ProcessRegistry, SendRequest};
use crate::types::identifiers::SessionId;
use crate::types::messages::CompactTrigger;
use crate::types::session::Session;

/// Fewest messages worth summarizing
pub const MIN_MESSAGES_FOR_COMPACTION: usize = 2;

/// Prefix of throwaway session identifiers
pub const THROWAWAY_SESSION_PREFIX: &str = "compact-";

/// Instruction sent ahead of the transcript
pub const SUMMARY_INSTRUCTION: &str = "Summarize the following conversation concisely. \
Capture the key context, decisions made and the current state of the work so \
that the conversation can be continued from the summary alone. Reply with the \
summary only.";

/// Prepend a compaction summary to an outgoing prompt
#[must_use]
pub fn seed_prompt(summary: &str, prompt: &str) -> String {
    format!("Summary of the conversation so far:\n{summary}\n\n{prompt}")
}

/// Final state of a compaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompactionOutcome {
    /// A summary was produced
    Summarized {
        /// Session being compacted
        target: SessionId,
        /// Why the compaction ran
        trigger: CompactTrigger,
        /// Token total before the compaction
        pre_tokens: u64,
        /// Produced summary
        summary: String,
    },
    /// The summarizing turn failed; the target is unchanged
    Failed {
        /// Session being compacted
        target: SessionId,
        /// What went wrong
        error: String,
    },
}

#[derive(Debug)]
struct CompactionJob {
    target: SessionId,
    trigger: CompactTrigger,
    pre_tokens: u64,
    streamed: Option<String>,
    result_text: Option<String>,
    failure: Option<String>,
}

/// Tracks in-flight compactions by their throwaway session
#[derive(Debug, Default)]
pub struct CompactionController {
    jobs: HashMap<SessionId, CompactionJob>,
}

impl CompactionController {
    /// No compactions in flight
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start summarizing `session`
    ///
    /// Returns the throwaway session id, or `None` when there is nothing
    /// worth summarizing or the session is already being compacted.
    ///
    /// # Errors
    /// Propagates [`ProcessRegistry::send_message`] precondition failures
    pub fn start(
        &mut self,
        registry: &ProcessRegistry,
        session: &Session,
        trigger: CompactTrigger,
        model: String,
    ) -> Result<Option<SessionId>> {
        if session.messages.len() < MIN_MESSAGES_FOR_COMPACTION {
            log::debug!(
                "[{}] {} message(s), nothing to compact",
                session.id,
                session.messages.len()
            );
            return Ok(None);
        }
        if self.is_compacting(&session.id) {
            log::debug!("[{}] Compaction already running", session.id);
            return Ok(None);
        }

        let throwaway = SessionId::new(format!("{THROWAWAY_SESSION_PREFIX}{}", Uuid::new_v4()));
        let prompt = format!("{SUMMARY_INSTRUCTION}\n\n{}", session.transcript());

        self.jobs.insert(
            throwaway.clone(),
            CompactionJob {
                target: session.id.clone(),
                trigger,
                pre_tokens: session.used_tokens(),
                streamed: None,
                result_text: None,
                failure: None,
            },
        );

        if let Err(e) = registry.send_message(SendRequest {
            session_id: throwaway.clone(),
            prompt,
            resume_token: None,
            model,
        }) {
            self.jobs.remove(&throwaway);
            return Err(e);
        }

        log::info!(
            "[{}] Compaction ({}) started as {throwaway}",
            session.id,
            trigger.as_str()
        );
        Ok(Some(throwaway))
    }

    /// Whether `session_id` is a throwaway session of this controller
    #[must_use]
    pub fn owns(&self, session_id: &SessionId) -> bool {
        self.jobs.contains_key(session_id)
    }

    /// Whether `target` has a compaction in flight
    #[must_use]
    pub fn is_compacting(&self, target: &SessionId) -> bool {
        self.throwaway_for(target).is_some()
    }

    /// Throwaway session compacting `target`
    #[must_use]
    pub fn throwaway_for(&self, target: &SessionId) -> Option<SessionId> {
        self.jobs
            .iter()
            .find(|(_, job)| &job.target == target)
            .map(|(id, _)| id.clone())
    }

    /// Feed an event from a throwaway session
    ///
    /// Returns the outcome once the throwaway process has exited.
    pub fn handle_event(&mut self, event: &SessionEvent) -> Option<CompactionOutcome> {
        let job = self.jobs.get_mut(&event.session_id)?;

        match &event.kind {
            EventKind::Streaming { text } => job.streamed = Some(text.clone()),
            EventKind::Result { result } => job.result_text.clone_from(&result.text),
            EventKind::Error { error } => job.failure = Some(error.clone()),
            EventKind::RateLimitError { message, .. } => job.failure = Some(message.clone()),
            EventKind::Complete { code, aborted } => {
                let (code, aborted) = (*code, *aborted);
                let job = self.jobs.remove(&event.session_id)?;
                return Some(Self::conclude(job, code, aborted));
            }
            _ => {}
        }
        None
    }

    fn conclude(job: CompactionJob, code: i32, aborted: bool) -> CompactionOutcome {
        let CompactionJob {
            target,
            trigger,
            pre_tokens,
            streamed,
            result_text,
            failure,
        } = job;

        let error = if let Some(failure) = failure {
            failure
        } else if aborted {
            "summarization was aborted".to_string()
        } else {
            let summary = streamed
                .or(result_text)
                .map(|s| s.trim().to_string())
                .unwrap_or_default();
            if !summary.is_empty() {
                return CompactionOutcome::Summarized {
                    target,
                    trigger,
                    pre_tokens,
                    summary,
                };
            }
            format!("agent produced no summary (exit code {code})")
        };

        CompactionOutcome::Failed { target, error }
    }
}
