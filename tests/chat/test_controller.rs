//! Integration tests for `ChatController`
//!
//! Runs whole turns and compactions against fake agent scripts

#![cfg(unix)]

#[path = "../support/mod.rs"]
mod support;

use std::path::{Path, PathBuf};

use support::*;
use vault_chat_agent::{
    AgentSettings, ChatController, ChatError, ChatMessage, CompactTrigger, EventKind,
    MemoryRepository, PersistedState, ResumeToken, Role, SendOptions, Session, SessionEvent,
    SessionId, StateRepository, Subscription, SubscriptionScope, TokenStats,
};

const RATE_LIMITED: &str = r#"{"type":"result","subtype":"success","is_error":true,"result":"Claude AI usage limit reached|1735689600"}"#;
const TOOL_READ: &str = r#"{"type":"assistant","message":{"role":"assistant","content":[{"type":"tool_use","id":"t1","name":"Read","input":{"file_path":"inbox.md"}}]}}"#;
const TOOL_GREP: &str = r#"{"type":"assistant","message":{"role":"assistant","content":[{"type":"tool_use","id":"t2","name":"Grep","input":{"pattern":"TODO"}}]}}"#;
const THROWAWAY_INIT: &str = r#"{"type":"system","subtype":"init","session_id":"agent-summary"}"#;
const SUMMARY_RESULT: &str = r#"{"type":"result","subtype":"success","is_error":false,"result":"We discussed the vault layout.","usage":{"input_tokens":900,"output_tokens":40}}"#;

/// Agent that summarizes when asked to and otherwise answers with `answer`
fn agent(dir: &Path, answer: &[&str]) -> PathBuf {
    let script = format!(
        "case \"$last\" in\n\
         Summarize*)\n{}\n;;\n\
         *)\n{}\n;;\n\
         esac",
        emit(&[THROWAWAY_INIT, SUMMARY_TEXT, SUMMARY_RESULT]),
        emit(answer)
    );
    fake_agent(dir, "agent", &script)
}

/// Agent whose summarization turns fail
fn failing_summarizer(dir: &Path) -> PathBuf {
    let script = format!(
        "case \"$last\" in\n\
         Summarize*)\necho 'summarizer crashed' >&2\nexit 2\n;;\n\
         *)\n{}\n;;\n\
         esac",
        emit(&[INIT, TEXT_HELLO, RESULT_OK])
    );
    fake_agent(dir, "agent", &script)
}

/// A session with history, an agent conversation and usage
fn seeded_session() -> Session {
    let mut session = Session::with_id("seeded");
    session.push_message(ChatMessage::user("How is the vault organised?", None));
    session.push_message(ChatMessage::assistant("By project, then by date.", Vec::new()));
    session.resume_token = Some(ResumeToken::from("agent-old"));
    session.locked_model = Some("opus".to_string());
    session.token_stats = Some(TokenStats {
        input_tokens: 50_000,
        output_tokens: 5_000,
        context_window: 200_000,
        ..TokenStats::default()
    });
    session
}

fn open_with(settings: AgentSettings, sessions: Vec<Session>) -> (ChatController, MemoryRepository) {
    init_logger();
    let current = sessions.first().map(|s| s.id.clone());
    let repo = MemoryRepository::with_state(PersistedState {
        settings,
        sessions,
        current_session_id: current,
        ..PersistedState::default()
    });
    let controller = ChatController::open(repo.clone(), AgentSettings::default()).unwrap();
    (controller, repo)
}

/// Pump the controller until `done` matches a published event
async fn pump_until(
    controller: &mut ChatController,
    events: &mut Subscription,
    mut done: impl FnMut(&SessionEvent) -> bool,
) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    loop {
        tokio::time::timeout(EVENT_TIMEOUT, controller.pump())
            .await
            .expect("timed out waiting for agent events");
        for event in events.drain() {
            let finished = done(&event);
            seen.push(event);
            if finished {
                return seen;
            }
        }
    }
}

fn is_complete_for(id: &SessionId) -> impl FnMut(&SessionEvent) -> bool + '_ {
    move |e| &e.session_id == id && e.is_complete()
}

#[tokio::test]
async fn test_first_run_creates_current_session() {
    init_logger();
    let repo = MemoryRepository::new();
    let controller = ChatController::open(repo.clone(), AgentSettings::default()).unwrap();

    assert_eq!(controller.store().len(), 1);
    let current = controller.current_session_id().cloned().unwrap();
    assert_eq!(controller.bus().active_session(), Some(current.clone()));

    let saved = repo.snapshot().unwrap();
    assert_eq!(saved.current_session_id, Some(current));
}

#[tokio::test]
async fn test_turn_persists_assistant_message() {
    let dir = tempfile::tempdir().unwrap();
    let cli = agent(dir.path(), &[INIT, TOOL_READ, TOOL_GREP, TEXT_HELLO, RESULT_OK]);
    let (mut controller, repo) = open_with(settings_for(&cli, dir.path()), Vec::new());
    let id = controller.current_session_id().cloned().unwrap();
    let mut events = controller.subscribe(SubscriptionScope::Foreground);

    controller
        .send(&id, "What is in my inbox?", SendOptions::default())
        .unwrap();
    assert!(controller.is_busy(&id));

    let seen = pump_until(&mut controller, &mut events, is_complete_for(&id)).await;
    let channels: Vec<&str> = seen.iter().map(|e| e.channel().name()).collect();
    assert_eq!(
        channels,
        [
            "init",
            "toolUse",
            "toolUse",
            "streaming",
            "contextUpdate",
            "result",
            "assistant",
            "complete"
        ]
    );
    assert!(!controller.is_busy(&id));

    let session = controller.session(&id).unwrap();
    assert_eq!(session.messages.len(), 2);
    assert_eq!(session.messages[0].role, Role::User);
    assert_eq!(session.title.as_deref(), Some("What is in my inbox?"));
    let answer = &session.messages[1];
    assert_eq!(answer.role, Role::Assistant);
    assert_eq!(answer.content, "Hello from the vault");
    assert_eq!(answer.tool_steps.len(), 2);
    assert_eq!(session.resume_token, Some(ResumeToken::from("agent-123")));
    assert_eq!(session.locked_model.as_deref(), Some("sonnet"));
    assert_eq!(session.token_stats.as_ref().unwrap().input_tokens, 1000);

    let saved = repo.snapshot().unwrap();
    assert_eq!(saved.sessions[0].messages.len(), 2);
    assert!(!controller.accountant().ledger().is_empty());
}

#[tokio::test]
async fn test_background_session_completes_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let cli = agent(dir.path(), &[INIT, TEXT_HELLO, RESULT_OK]);
    let (mut controller, repo) = open_with(settings_for(&cli, dir.path()), Vec::new());
    let first = controller.current_session_id().cloned().unwrap();
    let mut foreground = controller.subscribe(SubscriptionScope::Foreground);
    let mut all = controller.subscribe(SubscriptionScope::AllSessions);

    controller
        .send(&first, "Tidy my tags", SendOptions::default())
        .unwrap();
    let second = controller.create_session().unwrap();
    assert_eq!(controller.current_session_id(), Some(&second));

    pump_until(&mut controller, &mut all, is_complete_for(&first)).await;

    assert!(foreground.drain().is_empty());
    let session = controller.session(&first).unwrap();
    assert_eq!(session.messages.len(), 2);
    assert_eq!(session.messages[1].content, "Hello from the vault");
    assert!(session.token_stats.is_some());
    // Background turns never reach the daily ledger
    assert!(controller.accountant().ledger().is_empty());

    let saved = repo.snapshot().unwrap();
    let saved_first = saved.sessions.iter().find(|s| s.id == first).unwrap();
    assert_eq!(saved_first.messages.len(), 2);
    assert_eq!(saved.current_session_id, Some(second));
}

#[tokio::test]
async fn test_send_preconditions() {
    let dir = tempfile::tempdir().unwrap();
    let cli = fake_agent(dir.path(), "agent", "exec sleep 30");
    let (mut controller, _repo) = open_with(settings_for(&cli, dir.path()), Vec::new());
    let id = controller.current_session_id().cloned().unwrap();
    assert!(!controller.try_pump());

    let missing = controller.send(&SessionId::from("missing"), "hi", SendOptions::default());
    assert!(matches!(missing, Err(ChatError::SessionNotFound(_))));

    controller.send(&id, "first", SendOptions::default()).unwrap();
    let busy = controller.send(&id, "second", SendOptions::default());
    assert!(matches!(busy, Err(ChatError::SessionBusy(_))));
    assert_eq!(controller.session(&id).unwrap().messages.len(), 1);

    let mut events = controller.subscribe(SubscriptionScope::AllSessions);
    assert!(controller.abort(&id));
    let seen = pump_until(&mut controller, &mut events, is_complete_for(&id)).await;
    assert!(matches!(
        seen.last().unwrap().kind,
        EventKind::Complete { aborted: true, .. }
    ));
    assert!(!controller.is_busy(&id));
}

#[tokio::test]
async fn test_session_stays_busy_until_complete_is_handled() {
    let dir = tempfile::tempdir().unwrap();
    let cli = agent(dir.path(), &[INIT, TOOL_READ, TEXT_HELLO, RESULT_OK]);
    let (mut controller, _repo) = open_with(settings_for(&cli, dir.path()), Vec::new());
    let id = controller.current_session_id().cloned().unwrap();
    let mut events = controller.subscribe(SubscriptionScope::AllSessions);

    controller.send(&id, "first", SendOptions::default()).unwrap();

    // The process exits while its events are still queued
    tokio::time::timeout(EVENT_TIMEOUT, async {
        while controller.registry().is_running(&id) {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("agent process never exited");
    assert!(controller.is_busy(&id));
    assert!(matches!(
        controller.send(&id, "second", SendOptions::default()),
        Err(ChatError::SessionBusy(_))
    ));
    assert!(!controller.run_compaction(&id).unwrap());

    pump_until(&mut controller, &mut events, is_complete_for(&id)).await;
    assert!(!controller.is_busy(&id));

    controller.send(&id, "second", SendOptions::default()).unwrap();
    pump_until(&mut controller, &mut events, is_complete_for(&id)).await;

    let messages = &controller.session(&id).unwrap().messages;
    let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, [Role::User, Role::Assistant, Role::User, Role::Assistant]);
    assert_eq!(messages[0].content, "first");
    assert_eq!(messages[2].content, "second");
    for answer in [&messages[1], &messages[3]] {
        assert_eq!(answer.content, "Hello from the vault");
        assert_eq!(answer.tool_steps.len(), 1);
    }
}

#[tokio::test]
async fn test_rate_limit_discards_pending_turn() {
    let dir = tempfile::tempdir().unwrap();
    let cli = agent(dir.path(), &[INIT, TEXT_HELLO, RATE_LIMITED]);
    let (mut controller, _repo) = open_with(settings_for(&cli, dir.path()), Vec::new());
    let id = controller.current_session_id().cloned().unwrap();
    let mut events = controller.subscribe(SubscriptionScope::Foreground);

    controller.send(&id, "hi", SendOptions::default()).unwrap();
    let seen = pump_until(&mut controller, &mut events, is_complete_for(&id)).await;

    let count = |channel: &str| seen.iter().filter(|e| e.channel().name() == channel).count();
    assert_eq!(count("rateLimitError"), 1);
    assert_eq!(count("error"), 0);
    assert_eq!(count("assistant"), 0);
    assert_eq!(controller.session(&id).unwrap().messages.len(), 1);
    assert!(controller.registry().get_pending_message(&id).is_none());
    assert!(!controller.is_busy(&id));
}

#[tokio::test]
async fn test_compaction_skips_short_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let cli = agent(dir.path(), &[RESULT_OK]);
    let mut short = Session::with_id("short");
    short.push_message(ChatMessage::user("Only one message", None));
    short.resume_token = Some(ResumeToken::from("agent-keep"));
    let before = short.clone();
    let (mut controller, _repo) = open_with(settings_for(&cli, dir.path()), vec![short]);
    let id = SessionId::from("short");

    assert!(!controller.run_compaction(&id).unwrap());
    assert!(!controller.is_busy(&id));
    assert!(controller.registry().running_sessions().is_empty());
    assert_eq!(controller.session(&id), Some(&before));

    assert!(matches!(
        controller.run_compaction(&SessionId::from("missing")),
        Err(ChatError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn test_manual_compaction_resets_agent_state() {
    let dir = tempfile::tempdir().unwrap();
    let cli = agent(dir.path(), &[INIT, TEXT_HELLO, RESULT_OK]);
    let (mut controller, repo) = open_with(settings_for(&cli, dir.path()), vec![seeded_session()]);
    let id = SessionId::from("seeded");
    let mut all = controller.subscribe(SubscriptionScope::AllSessions);

    assert!(controller.run_compaction(&id).unwrap());
    assert!(controller.is_busy(&id));
    assert!(!controller.run_compaction(&id).unwrap());

    let seen = pump_until(&mut controller, &mut all, |e| {
        matches!(e.kind, EventKind::Compact { .. })
    })
    .await;
    let args = recorded_args(&cli);
    assert!(args.windows(2).any(|w| w == ["--model", "opus"]));
    assert!(!args.contains(&"--resume".to_string()));
    assert!(recorded_prompt(&cli).contains("How is the vault organised?"));

    // Throwaway turns are never published
    assert!(seen.iter().all(|e| e.session_id == id));
    assert!(matches!(
        seen.last().unwrap().kind,
        EventKind::Compact {
            trigger: CompactTrigger::Manual,
            pre_tokens: 55_000
        }
    ));
    assert!(!controller.is_busy(&id));

    let session = controller.session(&id).unwrap();
    assert_eq!(session.messages.len(), 2);
    assert!(session.resume_token.is_none());
    assert!(session.locked_model.is_none());
    assert_eq!(
        session.pending_summary.as_deref(),
        Some("We discussed the vault layout.")
    );
    let stats = session.token_stats.as_ref().unwrap();
    assert_eq!(stats.used_tokens(), 0);
    assert_eq!(stats.compaction_count, 1);
    assert_eq!(stats.last_compaction_pre_tokens, Some(55_000));
    assert!(controller.registry().get_cli_session_id(&id).is_none());
    assert_eq!(repo.snapshot().unwrap().sessions[0].pending_summary, session.pending_summary);

    // The next prompt starts a fresh agent conversation seeded with the summary
    controller
        .send(&id, "Continue with the archive", SendOptions::default())
        .unwrap();
    pump_until(&mut controller, &mut all, is_complete_for(&id)).await;

    let prompt = recorded_prompt(&cli);
    assert!(prompt.starts_with("Summary of the conversation so far:"));
    assert!(prompt.contains("We discussed the vault layout."));
    assert!(prompt.ends_with("Continue with the archive"));
    assert!(!recorded_args(&cli).contains(&"--resume".to_string()));
    let session = controller.session(&id).unwrap();
    assert!(session.pending_summary.is_none());
    assert_eq!(session.resume_token, Some(ResumeToken::from("agent-123")));
    assert_eq!(session.messages.len(), 4);
}

#[tokio::test]
async fn test_failed_compaction_leaves_session_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let cli = failing_summarizer(dir.path());
    let (mut controller, _repo) = open_with(settings_for(&cli, dir.path()), vec![seeded_session()]);
    let id = SessionId::from("seeded");
    let before = controller.session(&id).cloned().unwrap();
    let mut all = controller.subscribe(SubscriptionScope::AllSessions);

    assert!(controller.run_compaction(&id).unwrap());
    let seen = pump_until(&mut controller, &mut all, |e| {
        matches!(e.kind, EventKind::Error { .. })
    })
    .await;

    match &seen.last().unwrap().kind {
        EventKind::Error { error } => {
            assert!(error.starts_with("Compaction failed"));
            assert!(error.contains("summarizer crashed"));
        }
        other => panic!("expected error, got {other:?}"),
    }
    assert_eq!(seen.last().unwrap().session_id, id);
    assert!(!controller.is_busy(&id));
    assert_eq!(controller.session(&id), Some(&before));
    assert_eq!(
        controller.registry().get_cli_session_id(&id),
        Some(ResumeToken::from("agent-old"))
    );
}

#[tokio::test]
async fn test_threshold_crossing_compacts_after_turn() {
    let dir = tempfile::tempdir().unwrap();
    let cli = agent(dir.path(), &[INIT, TEXT_HELLO, RESULT_HIGH_USAGE]);
    let (mut controller, _repo) = open_with(settings_for(&cli, dir.path()), Vec::new());
    let id = controller.current_session_id().cloned().unwrap();
    let mut events = controller.subscribe(SubscriptionScope::Foreground);

    controller
        .send(&id, "Index every note", SendOptions::default())
        .unwrap();
    pump_until(&mut controller, &mut events, is_complete_for(&id)).await;

    // Flagged during the turn, executed once it completed
    assert!(controller.accountant().is_pending(&id));
    assert!(controller.is_busy(&id));

    let seen = pump_until(&mut controller, &mut events, |e| {
        matches!(e.kind, EventKind::Compact { .. })
    })
    .await;
    assert!(matches!(
        seen.last().unwrap().kind,
        EventKind::Compact {
            trigger: CompactTrigger::Auto,
            pre_tokens: 68_000
        }
    ));
    assert!(!controller.accountant().is_pending(&id));
    assert!(controller.session(&id).unwrap().pending_summary.is_some());
}

#[tokio::test]
async fn test_delete_session_moves_current() {
    let (mut controller, repo) = open_with(AgentSettings::default(), Vec::new());
    let first = controller.current_session_id().cloned().unwrap();
    let second = controller.create_session().unwrap();

    controller.delete_session(&second).unwrap();
    assert_eq!(controller.current_session_id(), Some(&first));
    assert_eq!(controller.bus().active_session(), Some(first.clone()));
    assert!(matches!(
        controller.delete_session(&second),
        Err(ChatError::SessionNotFound(_))
    ));

    controller.rename_session(&first, "Inbox triage").unwrap();
    let saved = repo.load().unwrap().unwrap();
    assert_eq!(saved.sessions.len(), 1);
    assert_eq!(saved.sessions[0].title.as_deref(), Some("Inbox triage"));
}

#[tokio::test]
async fn test_update_settings_validates_and_persists() {
    let (mut controller, repo) = open_with(AgentSettings::default(), Vec::new());

    let mut invalid = controller.settings().clone();
    invalid.auto_compact_threshold_percent = 0.0;
    assert!(matches!(
        controller.update_settings(invalid),
        Err(ChatError::InvalidConfig(_))
    ));

    let mut settings = controller.settings().clone();
    settings.default_model = "opus".to_string();
    settings.effective_context_limit = 100_000;
    controller.update_settings(settings).unwrap();

    assert_eq!(controller.registry().settings().default_model, "opus");
    assert_eq!(controller.accountant().config().effective_limit, 100_000);
    assert_eq!(repo.snapshot().unwrap().settings.default_model, "opus");
}

#[tokio::test]
async fn test_handle_drives_spawned_controller() {
    let dir = tempfile::tempdir().unwrap();
    let cli = agent(dir.path(), &[INIT, TEXT_HELLO, RESULT_OK]);
    let (controller, repo) = open_with(settings_for(&cli, dir.path()), Vec::new());
    let (chat, task) = controller.spawn();
    let mut events = chat.subscribe(SubscriptionScope::Foreground);

    let id = chat.create_session().await.unwrap();
    assert_eq!(chat.current_session(), Some(id.clone()));
    chat.send(id.clone(), "hello", SendOptions::default())
        .await
        .unwrap();

    loop {
        let event = tokio::time::timeout(EVENT_TIMEOUT, events.recv())
            .await
            .unwrap()
            .unwrap();
        if event.is_complete() {
            break;
        }
    }

    chat.shutdown().await;
    task.await.unwrap();
    assert!(matches!(
        chat.create_session().await,
        Err(ChatError::Closed)
    ));

    let saved = repo.snapshot().unwrap();
    let session = saved.sessions.iter().find(|s| s.id == id).unwrap();
    assert_eq!(session.messages.len(), 2);
}
