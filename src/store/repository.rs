//! Durable storage for the persisted chat state

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::accounting::UsageLedger;
use crate::error::{ChatError, Result};
use crate::types::identifiers::SessionId;
use crate::types::options::AgentSettings;
use crate::types::session::Session;

/// The whole persisted document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedState {
    /// Agent settings
    pub settings: AgentSettings,
    /// Sessions, newest first
    pub sessions: Vec<Session>,
    /// Session shown in the chat view
    pub current_session_id: Option<SessionId>,
    /// Daily usage history
    pub usage_history: UsageLedger,
}

/// Storage backend for [`PersistedState`]
pub trait StateRepository: Send + Sync {
    /// Load the stored state; `None` when nothing was saved yet
    ///
    /// # Errors
    /// Returns an error if the stored document cannot be read or decoded
    fn load(&self) -> Result<Option<PersistedState>>;

    /// Replace the stored state
    ///
    /// # Errors
    /// Returns an error if the document cannot be written
    fn save(&self, state: &PersistedState) -> Result<()>;
}

// ============================================================================
// JSON file
// ============================================================================

/// Stores the state as one JSON file, replaced atomically on every save
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    /// Repository backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the state file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateRepository for JsonFileRepository {
    fn load(&self) -> Result<Option<PersistedState>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let state = serde_json::from_str(&raw).map_err(|e| {
            ChatError::persistence(format!("{} is not valid state: {e}", self.path.display()))
        })?;
        Ok(Some(state))
    }

    fn save(&self, state: &PersistedState) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(state)?;
        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, json)?;
        // Atomic rename
        std::fs::rename(&temp_path, &self.path)?;
        log::debug!(
            "Saved {} session(s) to {}",
            state.sessions.len(),
            self.path.display()
        );
        Ok(())
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Keeps the state in memory; clones share the same document
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    state: Option<PersistedState>,
    saves: usize,
}

impl MemoryRepository {
    /// Empty repository
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository pre-seeded with `state`
    #[must_use]
    pub fn with_state(state: PersistedState) -> Self {
        let repo = Self::default();
        repo.inner.lock().state = Some(state);
        repo
    }

    /// Last saved document
    #[must_use]
    pub fn snapshot(&self) -> Option<PersistedState> {
        self.inner.lock().state.clone()
    }

    /// Number of saves performed
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.inner.lock().saves
    }
}

impl StateRepository for MemoryRepository {
    fn load(&self) -> Result<Option<PersistedState>> {
        Ok(self.snapshot())
    }

    fn save(&self, state: &PersistedState) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.state = Some(state.clone());
        inner.saves += 1;
        Ok(())
    }
}
