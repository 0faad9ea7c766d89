//! Vault chat REPL
//!
//! Drives the chat controller from stdin. Prompts go to the displayed
//! session; slash commands manage sessions. State lives under the vault.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use vault_chat_agent::{
    AgentSettings, ChatController, ChatHandle, EventKind, JsonFileRepository, SendOptions,
    SessionEvent, SessionId, SubscriptionScope,
};

const STATE_DIR: &str = ".vault-chat";
const STATE_FILE: &str = "state.json";

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let vault_root = std::env::args_os()
        .nth(1)
        .map_or_else(std::env::current_dir, |dir| Ok(PathBuf::from(dir)))
        .context("Failed to determine the vault directory")?;
    let vault_root = vault_root
        .canonicalize()
        .with_context(|| format!("Vault directory {} does not exist", vault_root.display()))?;

    let repository = JsonFileRepository::new(vault_root.join(STATE_DIR).join(STATE_FILE));
    let defaults = AgentSettings::builder().vault_root(&vault_root).build();
    let mut controller =
        ChatController::open(repository, defaults).context("Failed to load chat state")?;

    let mut settings = controller.settings().clone();
    if settings.vault_root != vault_root {
        settings.vault_root = vault_root.clone();
        controller.update_settings(settings)?;
    }

    let (chat, task) = controller.spawn();
    let printer = tokio::spawn(print_events(chat.clone()));

    println!(
        "vault-chat {} in {}",
        vault_chat_agent::VERSION,
        vault_root.display()
    );
    println!("Commands: /new, /switch <id>, /compact, /abort, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }
        if let Err(e) = handle_line(&chat, line).await {
            eprintln!("error: {e}");
        }
    }

    chat.shutdown().await;
    task.await.context("Chat controller task failed")?;
    printer.abort();
    Ok(())
}

async fn handle_line(chat: &ChatHandle, line: &str) -> Result<()> {
    let current = || {
        chat.current_session()
            .context("No session selected; use /new")
    };

    match line.split_once(' ').unwrap_or((line, "")) {
        ("/new", _) => {
            let id = chat.create_session().await?;
            println!("Session {id}");
        }
        ("/switch", id) if !id.trim().is_empty() => {
            chat.switch_session(SessionId::new(id.trim())).await?;
            println!("Switched to {}", id.trim());
        }
        ("/compact", _) => {
            if !chat.run_compaction(current()?).await? {
                println!("Nothing to compact");
            }
        }
        ("/abort", _) => {
            if !chat.abort(current()?).await? {
                println!("Nothing running");
            }
        }
        (cmd, _) if cmd.starts_with('/') => println!("Unknown command {cmd}"),
        _ => chat.send(current()?, line, SendOptions::default()).await?,
    }
    Ok(())
}

async fn print_events(chat: ChatHandle) {
    let mut events = chat.subscribe(SubscriptionScope::Foreground);
    let mut shown = 0;
    while let Some(SessionEvent { kind, .. }) = events.recv().await {
        match kind {
            EventKind::Streaming { text } => {
                // Streaming text is cumulative; print only what is new
                if let Some(delta) = text.get(shown..) {
                    print!("{delta}");
                    let _ = std::io::stdout().flush();
                }
                shown = text.len();
            }
            EventKind::ToolUse { tool } => println!("\n[{}]", tool.name),
            EventKind::Error { error } => println!("\nerror: {error}"),
            EventKind::RateLimitError {
                reset_time,
                message,
            } => match reset_time {
                Some(reset) => println!("\n{message} (resets {reset})"),
                None => println!("\n{message}"),
            },
            EventKind::Compact {
                trigger,
                pre_tokens,
            } => println!(
                "\n[compacted ({}), {pre_tokens} tokens before]",
                trigger.as_str()
            ),
            EventKind::Complete { aborted, .. } => {
                if aborted {
                    println!("\n[aborted]");
                } else {
                    println!();
                }
                shown = 0;
            }
            _ => {}
        }
    }
}
