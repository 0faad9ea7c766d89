//! Shared helpers for integration tests
//!
//! Fake agents are small shell scripts that print canned stream-json lines,
//! so the real process plumbing is exercised without the real CLI.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;
use vault_chat_agent::{AgentSettings, SessionEvent};

/// Upper bound for any single wait in a test
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Initialise logging once per test binary
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Write an executable fake agent whose body is `script`
///
/// The script sees the CLI arguments as `"$@"`; the prompt is the last one.
/// Every invocation records its arguments to `<name>.args` and its prompt to
/// `<name>.prompt` next to the script.
pub fn fake_agent(dir: &Path, name: &str, script: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    let body = format!(
        "#!/bin/sh\n\
         printf '%s\\n' \"$@\" > \"$0.args\"\n\
         for arg; do last=\"$arg\"; done\n\
         printf '%s' \"$last\" > \"$0.prompt\"\n\
         {script}\n"
    );
    std::fs::write(&path, body).expect("write fake agent");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod fake agent");
    path
}

/// Script fragment printing `lines` verbatim on stdout
pub fn emit(lines: &[&str]) -> String {
    format!("cat <<'JSON'\n{}\nJSON", lines.join("\n"))
}

/// Settings pointing at a fake agent, running in `vault`
pub fn settings_for(cli: &Path, vault: &Path) -> AgentSettings {
    AgentSettings::builder()
        .cli_path(cli)
        .vault_root(vault)
        .build()
}

/// Arguments the fake agent at `cli` was last invoked with
pub fn recorded_args(cli: &Path) -> Vec<String> {
    let raw = std::fs::read_to_string(cli.with_extension("args")).unwrap_or_default();
    raw.lines().map(str::to_string).collect()
}

/// Prompt the fake agent at `cli` last received
pub fn recorded_prompt(cli: &Path) -> String {
    std::fs::read_to_string(cli.with_extension("prompt")).unwrap_or_default()
}

/// Receive events until the session's `Complete`, inclusive
pub async fn collect_until_complete(
    rx: &mut mpsc::UnboundedReceiver<SessionEvent>,
) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    loop {
        let event = tokio::time::timeout(EVENT_TIMEOUT, rx.recv())
            .await
            .expect("timed out waiting for agent events")
            .expect("event inbox closed");
        let done = event.is_complete();
        events.push(event);
        if done {
            return events;
        }
    }
}

// ============================================================================
// Canned records
// ============================================================================

pub const INIT: &str = r#"{"type":"system","subtype":"init","session_id":"agent-123","model":"sonnet"}"#;

pub const TEXT_HELLO: &str = r#"{"type":"assistant","message":{"role":"assistant","content":[{"type":"text","text":"Hello from the vault"}]}}"#;

pub const RESULT_OK: &str = r#"{"type":"result","subtype":"success","is_error":false,"result":"Hello from the vault","duration_ms":1200,"num_turns":1,"total_cost_usd":0.01,"usage":{"input_tokens":1000,"output_tokens":200,"cache_read_input_tokens":50}}"#;

pub const RESULT_HIGH_USAGE: &str = r#"{"type":"result","subtype":"success","is_error":false,"result":"done","usage":{"input_tokens":60000,"output_tokens":8000,"cache_read_input_tokens":0}}"#;

pub const SUMMARY_TEXT: &str = r#"{"type":"assistant","message":{"role":"assistant","content":[{"type":"text","text":"We discussed the vault layout."}]}}"#;
