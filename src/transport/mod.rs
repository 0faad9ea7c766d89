//! Transport layer for communicating with the agent CLI
//!
//! Every turn runs as its own short-lived CLI process in print mode; the
//! prompt goes in as an argument and structured records come back on stdout.

pub mod subprocess;

pub use subprocess::{AgentInvocation, AgentProcess, CommandBuilder, resolve_cli_path, spawn_agent};
