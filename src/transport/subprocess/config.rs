//! Configuration constants for agent subprocesses

/// Size of each stdout read
pub const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Number of trailing stderr lines kept for failure reports
pub const STDERR_TAIL_LINES: usize = 20;

/// Dangerous environment variables that should not be passed to subprocess
///
/// These variables can affect how the subprocess loads and executes code,
/// so user-provided overrides for them are ignored.
pub const DANGEROUS_ENV_VARS: &[&str] = &[
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "DYLD_INSERT_LIBRARIES",
    "DYLD_LIBRARY_PATH",
    "NODE_OPTIONS",
    "PYTHONPATH",
    "PERL5LIB",
    "RUBYLIB",
];

/// Name of the agent executable looked up on `PATH`
pub const CLI_BINARY_NAME: &str = "claude";
