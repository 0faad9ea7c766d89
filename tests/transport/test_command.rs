//! Unit tests for the CLI command builder and path resolution

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use vault_chat_agent::transport::{AgentInvocation, CommandBuilder, resolve_cli_path};
use vault_chat_agent::types::{AgentPermissions, AgentSettings, PermissionMode, ResumeToken};

fn args_of(settings: &AgentSettings, invocation: &AgentInvocation) -> Vec<String> {
    let cmd = CommandBuilder::new(Path::new("/usr/bin/claude"), invocation, settings).build();
    cmd.as_std()
        .get_args()
        .map(|a| a.to_string_lossy().into_owned())
        .collect()
}

fn invocation(resume: Option<&str>) -> AgentInvocation {
    AgentInvocation {
        prompt: "--not-a-flag summarize".to_string(),
        model: "opus".to_string(),
        resume_token: resume.map(ResumeToken::from),
    }
}

#[test]
fn test_base_arguments_and_prompt_last() {
    let settings = AgentSettings::default();
    let args = args_of(&settings, &invocation(None));

    assert_eq!(
        &args[..6],
        ["--print", "--output-format", "stream-json", "--verbose", "--model", "opus"]
    );
    assert!(!args.contains(&"--resume".to_string()));
    assert_eq!(&args[args.len() - 2..], ["--", "--not-a-flag summarize"]);
}

#[test]
fn test_resume_flag_carries_token() {
    let args = args_of(&AgentSettings::default(), &invocation(Some("agent-42")));
    let pos = args.iter().position(|a| a == "--resume").unwrap();
    assert_eq!(args[pos + 1], "agent-42");
}

#[test]
fn test_disabled_capabilities_are_denied_explicitly() {
    let settings = AgentSettings::builder()
        .permissions(AgentPermissions::WEB_FETCH)
        .permission_mode(PermissionMode::Plan)
        .build();
    let args = args_of(&settings, &invocation(None));

    let mode = args.iter().position(|a| a == "--permission-mode").unwrap();
    assert_eq!(args[mode + 1], "plan");

    let allowed = args.iter().position(|a| a == "--allowedTools").unwrap();
    assert_eq!(args[allowed + 1], "WebFetch");

    let denied = args.iter().position(|a| a == "--disallowedTools").unwrap();
    let denied: Vec<&str> = args[denied + 1].split(',').collect();
    assert!(denied.contains(&"WebSearch"));
    assert!(denied.contains(&"Task"));
}

#[test]
fn test_all_capabilities_enabled_denies_nothing() {
    let args = args_of(&AgentSettings::default(), &invocation(None));
    assert!(!args.contains(&"--disallowedTools".to_string()));
}

#[test]
fn test_runs_in_vault_with_filtered_env() {
    let settings = AgentSettings::builder()
        .vault_root("/tmp/vault")
        .env("LD_PRELOAD", "/evil.so")
        .env("VAULT_THEME", "dark")
        .build();
    let invocation = invocation(None);
    let cmd = CommandBuilder::new(Path::new("/usr/bin/claude"), &invocation, &settings).build();
    let std_cmd = cmd.as_std();

    assert_eq!(std_cmd.get_current_dir(), Some(Path::new("/tmp/vault")));
    let envs: Vec<(&OsStr, Option<&OsStr>)> = std_cmd.get_envs().collect();
    assert!(envs.contains(&(OsStr::new("VAULT_THEME"), Some(OsStr::new("dark")))));
    assert!(!envs.iter().any(|(k, _)| *k == OsStr::new("LD_PRELOAD")));
}

#[test]
fn test_explicit_cli_path_wins() {
    let settings = AgentSettings::builder().cli_path("/opt/agent/claude").build();
    assert_eq!(
        resolve_cli_path(&settings).unwrap(),
        PathBuf::from("/opt/agent/claude")
    );
}
