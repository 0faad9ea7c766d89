//! Command loop and the cloneable handle that drives it

use std::ops::ControlFlow;

use tokio::sync::{mpsc, oneshot};

use crate::error::{ChatError, Result};
use crate::events::{EventBus, Subscription, SubscriptionScope};
use crate::types::identifiers::SessionId;
use crate::types::options::AgentSettings;

use super::controller::{ChatController, SendOptions};

/// Capacity of the command channel
const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Commands accepted by [`ChatController::run`]
#[derive(Debug)]
pub enum ChatCommand {
    /// Send a prompt
    Send {
        /// Target session
        session_id: SessionId,
        /// Prompt text
        prompt: String,
        /// Per-send options
        options: SendOptions,
        /// Reply channel
        reply: oneshot::Sender<Result<()>>,
    },
    /// Abort a session's turn
    Abort {
        /// Target session
        session_id: SessionId,
        /// Whether anything was running
        reply: oneshot::Sender<bool>,
    },
    /// Create and display a session
    CreateSession {
        /// New session id
        reply: oneshot::Sender<Result<SessionId>>,
    },
    /// Display a session
    SwitchSession {
        /// Target session
        session_id: SessionId,
        /// Reply channel
        reply: oneshot::Sender<Result<()>>,
    },
    /// Delete a session
    DeleteSession {
        /// Target session
        session_id: SessionId,
        /// Reply channel
        reply: oneshot::Sender<Result<()>>,
    },
    /// Compact a session
    RunCompaction {
        /// Target session
        session_id: SessionId,
        /// Whether a compaction started
        reply: oneshot::Sender<Result<bool>>,
    },
    /// Replace the settings
    UpdateSettings {
        /// New settings
        settings: AgentSettings,
        /// Reply channel
        reply: oneshot::Sender<Result<()>>,
    },
    /// Abort everything and stop the loop
    Shutdown,
}

impl ChatController {
    /// Spawn the controller loop and return a handle to it
    #[must_use]
    pub fn spawn(self) -> (ChatHandle, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let handle = ChatHandle {
            commands: tx,
            bus: self.bus(),
        };
        let task = tokio::spawn(self.run(rx));
        (handle, task)
    }

    /// Serve commands and agent events until shutdown
    ///
    /// Stops on [`ChatCommand::Shutdown`] or when every command sender is
    /// gone, aborting all processes on the way out.
    pub async fn run(mut self, mut commands: mpsc::Receiver<ChatCommand>) {
        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    if self.execute(command).is_break() {
                        break;
                    }
                }
                Some(event) = self.inbox.recv() => self.handle_event(event),
            }
        }
        self.shutdown();
    }

    fn execute(&mut self, command: ChatCommand) -> ControlFlow<()> {
        // A dropped reply receiver only means the caller stopped waiting
        match command {
            ChatCommand::Send {
                session_id,
                prompt,
                options,
                reply,
            } => {
                let _ = reply.send(self.send(&session_id, &prompt, options));
            }
            ChatCommand::Abort { session_id, reply } => {
                let _ = reply.send(self.abort(&session_id));
            }
            ChatCommand::CreateSession { reply } => {
                let _ = reply.send(self.create_session());
            }
            ChatCommand::SwitchSession { session_id, reply } => {
                let _ = reply.send(self.switch_session(&session_id));
            }
            ChatCommand::DeleteSession { session_id, reply } => {
                let _ = reply.send(self.delete_session(&session_id));
            }
            ChatCommand::RunCompaction { session_id, reply } => {
                let _ = reply.send(self.run_compaction(&session_id));
            }
            ChatCommand::UpdateSettings { settings, reply } => {
                let _ = reply.send(self.update_settings(settings));
            }
            ChatCommand::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }
}

/// Cloneable client of a running [`ChatController`]
#[derive(Clone)]
pub struct ChatHandle {
    commands: mpsc::Sender<ChatCommand>,
    bus: EventBus,
}

impl ChatHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> ChatCommand,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| ChatError::Closed)?;
        rx.await.map_err(|_| ChatError::Closed)
    }

    /// Send a prompt
    ///
    /// # Errors
    /// See [`ChatController::send`]; [`ChatError::Closed`] after shutdown
    pub async fn send(
        &self,
        session_id: SessionId,
        prompt: impl Into<String>,
        options: SendOptions,
    ) -> Result<()> {
        let prompt = prompt.into();
        self.request(|reply| ChatCommand::Send {
            session_id,
            prompt,
            options,
            reply,
        })
        .await?
    }

    /// Abort a session's turn
    ///
    /// # Errors
    /// Returns [`ChatError::Closed`] after shutdown
    pub async fn abort(&self, session_id: SessionId) -> Result<bool> {
        self.request(|reply| ChatCommand::Abort { session_id, reply })
            .await
    }

    /// Create and display a session
    ///
    /// # Errors
    /// See [`ChatController::create_session`]
    pub async fn create_session(&self) -> Result<SessionId> {
        self.request(|reply| ChatCommand::CreateSession { reply })
            .await?
    }

    /// Display a session
    ///
    /// # Errors
    /// See [`ChatController::switch_session`]
    pub async fn switch_session(&self, session_id: SessionId) -> Result<()> {
        self.request(|reply| ChatCommand::SwitchSession { session_id, reply })
            .await?
    }

    /// Delete a session
    ///
    /// # Errors
    /// See [`ChatController::delete_session`]
    pub async fn delete_session(&self, session_id: SessionId) -> Result<()> {
        self.request(|reply| ChatCommand::DeleteSession { session_id, reply })
            .await?
    }

    /// Compact a session
    ///
    /// # Errors
    /// See [`ChatController::run_compaction`]
    pub async fn run_compaction(&self, session_id: SessionId) -> Result<bool> {
        self.request(|reply| ChatCommand::RunCompaction { session_id, reply })
            .await?
    }

    /// Replace the settings
    ///
    /// # Errors
    /// See [`ChatController::update_settings`]
    pub async fn update_settings(&self, settings: AgentSettings) -> Result<()> {
        self.request(|reply| ChatCommand::UpdateSettings { settings, reply })
            .await?
    }

    /// Stop the controller loop
    pub async fn shutdown(&self) {
        if self.commands.send(ChatCommand::Shutdown).await.is_err() {
            log::debug!("Chat controller already stopped");
        }
    }

    /// Displayed session
    #[must_use]
    pub fn current_session(&self) -> Option<SessionId> {
        self.bus.active_session()
    }

    /// Subscribe to published events
    #[must_use]
    pub fn subscribe(&self, scope: SubscriptionScope) -> Subscription {
        self.bus.subscribe(scope)
    }
}
