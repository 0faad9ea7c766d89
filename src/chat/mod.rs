//! Chat orchestration
//!
//! [`ChatController`] is the one owner of sessions, processes, accounting and
//! compaction. It can be driven directly (`&mut` methods plus [`ChatController::pump`])
//! or spawned as a task and driven through a [`ChatHandle`].

mod controller;
mod reactions;
mod runner;

pub use controller::{ChatController, SendOptions};
pub use runner::{ChatCommand, ChatHandle};
