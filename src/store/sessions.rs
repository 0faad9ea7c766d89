//! In-memory session list with a current-session pointer

use crate::error::{ChatError, Result};
use crate::types::identifiers::SessionId;
use crate::types::session::Session;

/// Most sessions kept; older ones are dropped on create and on load
pub const MAX_SESSIONS: usize = 20;

/// The single mutable home of every session
///
/// Sessions are ordered newest first. Whenever at least one session exists,
/// exactly one of them is current.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Vec<Session>,
    current: Option<SessionId>,
}

impl SessionStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from persisted sessions
    ///
    /// Keeps the newest [`MAX_SESSIONS`] and falls back to the newest session
    /// when the persisted current session is missing.
    #[must_use]
    pub fn from_sessions(mut sessions: Vec<Session>, current: Option<SessionId>) -> Self {
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if sessions.len() > MAX_SESSIONS {
            log::info!(
                "Dropping {} session(s) beyond the limit of {MAX_SESSIONS}",
                sessions.len() - MAX_SESSIONS
            );
            sessions.truncate(MAX_SESSIONS);
        }

        let current = current
            .filter(|id| sessions.iter().any(|s| &s.id == id))
            .or_else(|| sessions.first().map(|s| s.id.clone()));

        Self { sessions, current }
    }

    /// Create a session if none exist; returns whether one was created
    pub fn ensure_session(&mut self) -> bool {
        if self.sessions.is_empty() {
            self.create();
            true
        } else {
            false
        }
    }

    /// Create a new session, make it current and return it with any sessions
    /// evicted by the cap
    pub fn create(&mut self) -> (SessionId, Vec<Session>) {
        let session = Session::new();
        let id = session.id.clone();
        self.sessions.insert(0, session);
        let evicted = if self.sessions.len() > MAX_SESSIONS {
            self.sessions.split_off(MAX_SESSIONS)
        } else {
            Vec::new()
        };
        self.current = Some(id.clone());
        log::info!("[{id}] Session created");
        (id, evicted)
    }

    /// Make `id` the current session
    ///
    /// # Errors
    /// Returns [`ChatError::SessionNotFound`] for unknown sessions
    pub fn switch(&mut self, id: &SessionId) -> Result<()> {
        if !self.contains(id) {
            return Err(ChatError::session_not_found(id));
        }
        self.current = Some(id.clone());
        Ok(())
    }

    /// Remove a session; the newest remaining one becomes current if needed
    ///
    /// # Errors
    /// Returns [`ChatError::SessionNotFound`] for unknown sessions
    pub fn delete(&mut self, id: &SessionId) -> Result<Session> {
        let index = self
            .sessions
            .iter()
            .position(|s| &s.id == id)
            .ok_or_else(|| ChatError::session_not_found(id))?;
        let removed = self.sessions.remove(index);
        if self.current.as_ref() == Some(id) {
            self.current = self.sessions.first().map(|s| s.id.clone());
        }
        log::info!("[{id}] Session deleted");
        Ok(removed)
    }

    /// Set a session's title
    ///
    /// # Errors
    /// Returns [`ChatError::SessionNotFound`] for unknown sessions
    pub fn rename(&mut self, id: &SessionId, title: impl Into<String>) -> Result<()> {
        let session = self
            .get_mut(id)
            .ok_or_else(|| ChatError::session_not_found(id))?;
        session.title = Some(title.into());
        Ok(())
    }

    /// Look up a session
    #[must_use]
    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| &s.id == id)
    }

    /// Look up a session for mutation
    pub fn get_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| &s.id == id)
    }

    /// Whether the session exists
    #[must_use]
    pub fn contains(&self, id: &SessionId) -> bool {
        self.get(id).is_some()
    }

    /// Current session identifier
    #[must_use]
    pub const fn current_id(&self) -> Option<&SessionId> {
        self.current.as_ref()
    }

    /// Current session
    #[must_use]
    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref().and_then(|id| self.get(id))
    }

    /// All sessions, newest first
    #[must_use]
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// Number of sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether there are no sessions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
