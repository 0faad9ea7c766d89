//! Session process registry implementation
//!
//! This module is organized into logical submodules:
//! - `core`: Core struct, constructors, lookups and accessors
//! - `spawn`: Turn spawning
//! - `interaction`: Abort and shutdown

// Module declarations
mod core;
mod interaction;
mod spawn;

// Re-export public API
pub use self::core::ProcessRegistry;
pub use spawn::SendRequest;
