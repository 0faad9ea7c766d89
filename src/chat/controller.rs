//! The chat controller and its UI commands

use std::collections::HashSet;

use chrono::Local;
use tokio::sync::mpsc;

use crate::accounting::{AccountantConfig, ContextAccountant};
use crate::compaction::{CompactionController, seed_prompt};
use crate::error::{ChatError, Result};
use crate::events::{EventBus, SessionEvent, Subscription, SubscriptionScope};
use crate::manager::{ProcessRegistry, SendRequest};
use crate::store::{PersistedState, SessionStore, StateRepository};
use crate::types::identifiers::{ResumeToken, SessionId};
use crate::types::messages::CompactTrigger;
use crate::types::options::AgentSettings;
use crate::types::session::{ChatMessage, SelectionContext, Session};

/// Per-send options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Model to use; ignored once the session has locked a model
    pub model: Option<String>,
    /// Agent conversation to continue instead of the session's own token
    pub resume_token: Option<ResumeToken>,
    /// Editor selection the prompt refers to
    pub selection: Option<SelectionContext>,
}

/// Owner of all chat state
///
/// Every mutation goes through `&mut self`: UI commands call the methods
/// below, and agent output arrives through an ordered inbox drained by
/// [`Self::pump`] or [`Self::run`]. Persistence and
/// accounting run for every session before an event is published, so a
/// session keeps progressing while another one is displayed.
pub struct ChatController {
    pub(super) settings: AgentSettings,
    pub(super) store: SessionStore,
    pub(super) registry: ProcessRegistry,
    pub(super) accountant: ContextAccountant,
    pub(super) compaction: CompactionController,
    /// Sessions whose turn `Complete` has not been handled yet
    ///
    /// Outlives the registry handle: the process can exit while its last
    /// events are still queued in the inbox.
    pub(super) in_flight: HashSet<SessionId>,
    pub(super) bus: EventBus,
    pub(super) repository: Box<dyn StateRepository>,
    pub(super) inbox: mpsc::UnboundedReceiver<SessionEvent>,
}

impl ChatController {
    /// Load persisted state, falling back to `defaults` on first run
    ///
    /// A session is created when none were stored.
    ///
    /// # Errors
    /// Returns an error if the stored state cannot be read, or the fallback
    /// session cannot be saved
    pub fn open(repository: impl StateRepository + 'static, defaults: AgentSettings) -> Result<Self> {
        let persisted = repository.load()?;
        let loaded = persisted.is_some();
        let PersistedState {
            settings,
            sessions,
            current_session_id,
            usage_history,
        } = persisted.unwrap_or_else(|| PersistedState {
            settings: defaults,
            ..PersistedState::default()
        });

        let mut store = SessionStore::from_sessions(sessions, current_session_id);
        let created = store.ensure_session();

        let (registry, inbox) = ProcessRegistry::with_inbox(settings.clone());
        for session in store.sessions() {
            if let Some(token) = &session.resume_token {
                registry.set_cli_session_id(&session.id, token.clone());
            }
        }

        let bus = EventBus::new();
        bus.set_active_session(store.current_id().cloned());

        let controller = Self {
            accountant: ContextAccountant::new(
                AccountantConfig::from_settings(&settings),
                usage_history,
            ),
            settings,
            store,
            registry,
            compaction: CompactionController::new(),
            in_flight: HashSet::new(),
            bus,
            repository: Box::new(repository),
            inbox,
        };

        log::info!(
            "Chat state {} with {} session(s)",
            if loaded { "loaded" } else { "initialised" },
            controller.store.len()
        );
        if created || !loaded {
            controller.persist()?;
        }
        Ok(controller)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Current settings
    #[must_use]
    pub const fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// The session store
    #[must_use]
    pub const fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Look up a session
    #[must_use]
    pub fn session(&self, id: &SessionId) -> Option<&Session> {
        self.store.get(id)
    }

    /// Displayed session
    #[must_use]
    pub fn current_session_id(&self) -> Option<&SessionId> {
        self.store.current_id()
    }

    /// The process registry
    #[must_use]
    pub const fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    /// The token accountant
    #[must_use]
    pub const fn accountant(&self) -> &ContextAccountant {
        &self.accountant
    }

    /// Handle to the event bus
    #[must_use]
    pub fn bus(&self) -> EventBus {
        self.bus.clone()
    }

    /// Subscribe to published events
    #[must_use]
    pub fn subscribe(&self, scope: SubscriptionScope) -> Subscription {
        self.bus.subscribe(scope)
    }

    /// Whether input for the session should be disabled
    #[must_use]
    pub fn is_busy(&self, id: &SessionId) -> bool {
        self.in_flight.contains(id)
            || self.registry.is_running(id)
            || self.compaction.is_compacting(id)
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Send a prompt to a session
    ///
    /// The user message is recorded and saved before the agent is spawned.
    /// The first send locks the session's model; a queued compaction summary
    /// is prepended to the outgoing prompt.
    ///
    /// # Errors
    /// Returns [`ChatError::SessionNotFound`] for unknown sessions,
    /// [`ChatError::SessionBusy`] while a turn or compaction is in flight,
    /// and persistence errors
    pub fn send(&mut self, id: &SessionId, prompt: &str, options: SendOptions) -> Result<()> {
        if !self.store.contains(id) {
            return Err(ChatError::session_not_found(id));
        }
        if self.is_busy(id) {
            return Err(ChatError::session_busy(id));
        }

        let registry_token = self.registry.get_cli_session_id(id);
        let default_model = self.settings.default_model.clone();
        let session = self
            .store
            .get_mut(id)
            .ok_or_else(|| ChatError::session_not_found(id))?;

        let model = match (&session.locked_model, options.model) {
            (Some(locked), Some(requested)) if *locked != requested => {
                log::warn!("[{id}] Model is locked to {locked}, ignoring {requested}");
                locked.clone()
            }
            (Some(locked), _) => locked.clone(),
            (None, requested) => requested.unwrap_or(default_model),
        };
        session.locked_model = Some(model.clone());

        let outgoing = match &session.pending_summary {
            Some(summary) => seed_prompt(summary, prompt),
            None => prompt.to_string(),
        };
        let resume_token = options
            .resume_token
            .or(registry_token)
            .or_else(|| session.resume_token.clone());

        session.push_message(ChatMessage::user(prompt, options.selection));
        self.persist()?;

        self.registry.send_message(SendRequest {
            session_id: id.clone(),
            prompt: outgoing,
            resume_token,
            model,
        })?;
        self.in_flight.insert(id.clone());
        Ok(())
    }

    /// Abort the session's turn and any compaction running for it
    ///
    /// Returns whether anything was running.
    pub fn abort(&mut self, id: &SessionId) -> bool {
        let mut aborted = self.registry.abort(id);
        if let Some(throwaway) = self.compaction.throwaway_for(id) {
            aborted |= self.registry.abort(&throwaway);
        }
        aborted
    }

    /// Create a session and display it
    ///
    /// # Errors
    /// Returns persistence errors
    pub fn create_session(&mut self) -> Result<SessionId> {
        let (id, evicted) = self.store.create();
        for session in evicted {
            log::info!("[{}] Evicted by the session limit", session.id);
            self.release_session(&session.id);
        }
        self.bus.set_active_session(Some(id.clone()));
        self.persist()?;
        Ok(id)
    }

    /// Display another session
    ///
    /// # Errors
    /// Returns [`ChatError::SessionNotFound`] and persistence errors
    pub fn switch_session(&mut self, id: &SessionId) -> Result<()> {
        self.store.switch(id)?;
        self.bus.set_active_session(Some(id.clone()));
        log::debug!("[{id}] Switched to session");
        self.persist()
    }

    /// Delete a session, aborting anything it runs
    ///
    /// # Errors
    /// Returns [`ChatError::SessionNotFound`] and persistence errors
    pub fn delete_session(&mut self, id: &SessionId) -> Result<()> {
        self.store.delete(id)?;
        self.release_session(id);
        self.bus.set_active_session(self.store.current_id().cloned());
        self.persist()
    }

    /// Rename a session
    ///
    /// # Errors
    /// Returns [`ChatError::SessionNotFound`] and persistence errors
    pub fn rename_session(&mut self, id: &SessionId, title: impl Into<String>) -> Result<()> {
        self.store.rename(id, title)?;
        self.persist()
    }

    /// Compact a session on user request
    ///
    /// Returns whether a compaction was started; sessions with fewer than two
    /// messages, a running turn or a compaction in flight are left alone.
    ///
    /// # Errors
    /// Returns [`ChatError::SessionNotFound`] for unknown sessions
    pub fn run_compaction(&mut self, id: &SessionId) -> Result<bool> {
        if !self.store.contains(id) {
            return Err(ChatError::session_not_found(id));
        }
        if self.in_flight.contains(id) || self.registry.is_running(id) {
            log::info!("[{id}] Turn in progress, compaction not started");
            return Ok(false);
        }
        self.start_compaction(id, CompactTrigger::Manual)
    }

    /// Replace the settings
    ///
    /// Takes effect for the next spawned process; running ones are untouched.
    ///
    /// # Errors
    /// Returns [`ChatError::InvalidConfig`] for a zero limit or a threshold
    /// outside `(0, 100]`, and persistence errors
    pub fn update_settings(&mut self, settings: AgentSettings) -> Result<()> {
        if settings.effective_context_limit == 0 {
            return Err(ChatError::invalid_config(
                "effective context limit must be positive",
            ));
        }
        let threshold = settings.auto_compact_threshold_percent;
        if !(threshold > 0.0 && threshold <= 100.0) {
            return Err(ChatError::invalid_config(format!(
                "auto-compact threshold {threshold} must be in (0, 100]"
            )));
        }

        self.accountant
            .set_config(AccountantConfig::from_settings(&settings));
        self.registry.update_settings(settings.clone());
        self.settings = settings;
        self.persist()
    }

    /// Abort every process and save
    pub fn shutdown(&mut self) {
        self.registry.shutdown();
        if let Err(e) = self.persist() {
            log::error!("Failed to save chat state on shutdown: {e}");
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    pub(super) fn start_compaction(&mut self, id: &SessionId, trigger: CompactTrigger) -> Result<bool> {
        let Some(session) = self.store.get(id) else {
            return Ok(false);
        };
        let model = session
            .locked_model
            .clone()
            .unwrap_or_else(|| self.settings.default_model.clone());
        let started = self
            .compaction
            .start(&self.registry, session, trigger, model)?;
        Ok(started.is_some())
    }

    fn release_session(&mut self, id: &SessionId) {
        self.abort(id);
        self.registry.clear_session(id);
        self.registry.clear_pending_message(id);
        self.accountant.forget(id);
    }

    pub(super) fn snapshot(&self) -> PersistedState {
        PersistedState {
            settings: self.settings.clone(),
            sessions: self.store.sessions().to_vec(),
            current_session_id: self.store.current_id().cloned(),
            usage_history: self.accountant.ledger().clone(),
        }
    }

    pub(super) fn persist(&self) -> Result<()> {
        self.repository.save(&self.snapshot())
    }

    /// Save from an event reaction, where failures can only be logged
    pub(super) fn persist_logged(&self, id: &SessionId) {
        if let Err(e) = self.persist() {
            log::error!("[{id}] Failed to save chat state: {e}");
        }
    }

    pub(super) fn today() -> chrono::NaiveDate {
        Local::now().date_naive()
    }
}
