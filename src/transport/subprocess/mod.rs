//! Subprocess plumbing for the agent CLI
//!
//! This module builds the CLI invocation, spawns it in the vault directory
//! with piped output, and drains its diagnostics.

mod command;
mod config;
mod lifecycle;
mod reader;

// Re-export public types
pub use command::{AgentInvocation, CommandBuilder};
pub use config::{CLI_BINARY_NAME, DANGEROUS_ENV_VARS, READ_CHUNK_SIZE, STDERR_TAIL_LINES};
pub use lifecycle::{AgentProcess, resolve_cli_path, spawn_agent};
pub use reader::spawn_stderr_collector;
