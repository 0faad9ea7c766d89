//! Session storage
//!
//! [`SessionStore`] holds the live sessions; a [`StateRepository`] persists
//! them together with the settings and the usage history.

mod repository;
mod sessions;

pub use repository::{JsonFileRepository, MemoryRepository, PersistedState, StateRepository};
pub use sessions::{MAX_SESSIONS, SessionStore};
