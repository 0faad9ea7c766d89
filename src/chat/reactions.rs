//! Reactions to agent events
//!
//! Runs for every session, displayed or not, before the event is published.

use crate::compaction::CompactionOutcome;
use crate::events::{EventKind, SessionEvent};
use crate::types::identifiers::SessionId;
use crate::types::messages::CompactTrigger;
use crate::types::session::TokenStats;

use super::controller::ChatController;

impl ChatController {
    /// Handle one queued agent event without waiting
    ///
    /// Returns `false` when the inbox is empty.
    pub fn try_pump(&mut self) -> bool {
        match self.inbox.try_recv() {
            Ok(event) => {
                self.handle_event(event);
                true
            }
            Err(_) => false,
        }
    }

    /// Wait for the next agent event and handle it
    pub async fn pump(&mut self) {
        if let Some(event) = self.inbox.recv().await {
            self.handle_event(event);
        }
    }

    /// Apply an agent event to the session state and publish it
    pub fn handle_event(&mut self, event: SessionEvent) {
        if self.compaction.owns(&event.session_id) {
            self.handle_compaction_event(&event);
            return;
        }

        let id = event.session_id.clone();
        if event.is_complete() {
            self.in_flight.remove(&id);
        }
        if !self.store.contains(&id) {
            log::debug!(
                "[{id}] {} for a deleted session",
                event.channel().name()
            );
            self.registry.clear_pending_message(&id);
            self.bus.publish(event);
            return;
        }

        match &event.kind {
            EventKind::Init { resume_token } => {
                if let Some(session) = self.store.get_mut(&id) {
                    session.resume_token = Some(resume_token.clone());
                    // The agent conversation that received the summary now exists
                    session.pending_summary = None;
                }
                self.persist_logged(&id);
            }
            EventKind::ContextUpdate { usage } => {
                let foreground = self.bus.is_foreground(&id);
                let today = Self::today();
                if let Some(session) = self.store.get_mut(&id) {
                    self.accountant.apply_usage(
                        &id,
                        &mut session.token_stats,
                        usage,
                        foreground,
                        today,
                    );
                }
                self.persist_logged(&id);
            }
            EventKind::Result { result } => {
                let fallback = result.text.clone();
                self.bus.publish(event);
                self.materialize_pending(&id, fallback.as_deref());
                return;
            }
            EventKind::Error { .. } | EventKind::RateLimitError { .. } => {
                self.registry.clear_pending_message(&id);
            }
            EventKind::Complete { aborted, .. } => {
                let aborted = *aborted;
                self.registry.clear_pending_message(&id);
                self.bus.publish(event);
                if !aborted && self.accountant.is_pending(&id) {
                    self.run_auto_compaction(&id);
                }
                return;
            }
            _ => {}
        }

        self.bus.publish(event);
    }

    /// Persist the finished assistant turn and announce it
    fn materialize_pending(&mut self, id: &SessionId, fallback: Option<&str>) {
        let Some(pending) = self.registry.take_pending_message(id) else {
            return;
        };
        let Some(message) = pending.into_message(fallback) else {
            log::debug!("[{id}] Turn finished without content");
            return;
        };
        let Some(session) = self.store.get_mut(id) else {
            return;
        };

        session.push_message(message.clone());
        self.persist_logged(id);
        self.bus
            .publish(SessionEvent::new(id, EventKind::Assistant { message }));
    }

    fn run_auto_compaction(&mut self, id: &SessionId) {
        match self.start_compaction(id, CompactTrigger::Auto) {
            Ok(true) => {}
            Ok(false) => {
                // Nothing to summarize, so the flag would never clear
                self.accountant.on_compacted(id);
            }
            Err(e) => {
                log::warn!("[{id}] Auto-compaction not started: {e}");
                self.accountant.on_compacted(id);
            }
        }
    }

    fn handle_compaction_event(&mut self, event: &SessionEvent) {
        let outcome = self.compaction.handle_event(event);
        if event.is_complete() {
            self.registry.clear_pending_message(&event.session_id);
            self.registry.clear_session(&event.session_id);
        }
        match outcome {
            Some(CompactionOutcome::Summarized {
                target,
                trigger,
                pre_tokens,
                summary,
            }) => self.apply_compaction(&target, trigger, pre_tokens, summary),
            Some(CompactionOutcome::Failed { target, error }) => {
                log::warn!("[{target}] Compaction failed: {error}");
                self.accountant.on_compacted(&target);
                if self.store.contains(&target) {
                    self.bus.publish(SessionEvent::new(
                        &target,
                        EventKind::Error {
                            error: format!("Compaction failed: {error}"),
                        },
                    ));
                }
            }
            None => {}
        }
    }

    fn apply_compaction(
        &mut self,
        id: &SessionId,
        trigger: CompactTrigger,
        pre_tokens: u64,
        summary: String,
    ) {
        self.accountant.on_compacted(id);
        let Some(session) = self.store.get_mut(id) else {
            log::debug!("[{id}] Session deleted during compaction");
            return;
        };

        self.registry.clear_session(id);
        session.resume_token = None;
        session.pending_summary = Some(summary);
        session.locked_model = None;
        session
            .token_stats
            .get_or_insert_with(TokenStats::default)
            .reset_after_compaction(pre_tokens);

        log::info!(
            "[{id}] Compacted ({}, {pre_tokens} tokens before)",
            trigger.as_str()
        );
        self.persist_logged(id);
        self.bus.publish(SessionEvent::new(
            id,
            EventKind::Compact {
                trigger,
                pre_tokens,
            },
        ));
    }
}
