// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Handle for talking to a running session engine

use tokio::sync::{mpsc, oneshot};

use crate::error::{AgentError, Result};
use crate::host::UserId;

/// Snapshot of engine occupancy and workspace index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStatus {
    pub active_sessions: usize,
    pub pending_agreements: usize,
    pub generating: usize,
    pub indexed_commands: usize,
    pub indexed_presets: usize,
    pub host_version: String,
}

/// What a reload request re-reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadScope {
    /// Settings file and workspace index
    All,
    /// Command and preset index only
    Workspace,
    /// Session settings only
    Config,
}

impl ReloadScope {
    pub fn includes_config(&self) -> bool {
        matches!(self, ReloadScope::All | ReloadScope::Config)
    }

    pub fn includes_workspace(&self) -> bool {
        matches!(self, ReloadScope::All | ReloadScope::Workspace)
    }
}

/// Outcome of a successful reload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadReport {
    pub config_reloaded: bool,
    pub indexed_commands: usize,
    pub indexed_presets: usize,
}

/// Requests from the host side of the boundary
#[derive(Debug)]
pub(crate) enum EngineCommand {
    UserMessage {
        user: UserId,
        text: String,
        reply: oneshot::Sender<bool>,
    },
    Toggle {
        user: UserId,
    },
    Confirm {
        user: UserId,
    },
    Cancel {
        user: UserId,
    },
    Status {
        reply: oneshot::Sender<EngineStatus>,
    },
    Reload {
        scope: ReloadScope,
        reply: oneshot::Sender<Result<ReloadReport>>,
    },
    Shutdown,
}

/// Cloneable sender side of the engine actor
#[derive(Debug, Clone)]
pub struct EngineHandle {
    commands: mpsc::UnboundedSender<EngineCommand>,
}

impl EngineHandle {
    pub(crate) fn new(commands: mpsc::UnboundedSender<EngineCommand>) -> Self {
        Self { commands }
    }

    fn send(&self, command: EngineCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| AgentError::Session("session engine has stopped".to_string()))
    }

    /// Offer a chat line to the engine. Returns true when the engine
    /// consumed it and normal delivery should be suppressed.
    pub async fn on_user_message(&self, user: UserId, text: impl Into<String>) -> bool {
        let (reply, rx) = oneshot::channel();
        let sent = self.send(EngineCommand::UserMessage {
            user,
            text: text.into(),
            reply,
        });
        if sent.is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Enter or leave a session
    pub fn on_toggle_request(&self, user: UserId) -> Result<()> {
        self.send(EngineCommand::Toggle { user })
    }

    /// Same as typing "y" while a command awaits confirmation
    pub fn on_confirm_request(&self, user: UserId) -> Result<()> {
        self.send(EngineCommand::Confirm { user })
    }

    /// Same as typing "n" while an action is pending
    pub fn on_cancel_request(&self, user: UserId) -> Result<()> {
        self.send(EngineCommand::Cancel { user })
    }

    pub async fn status(&self) -> Result<EngineStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::Status { reply })?;
        rx.await
            .map_err(|_| AgentError::Session("session engine has stopped".to_string()))
    }

    /// Re-read settings and/or the workspace index
    pub async fn reload(&self, scope: ReloadScope) -> Result<ReloadReport> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::Reload { scope, reply })?;
        rx.await
            .map_err(|_| AgentError::Session("session engine has stopped".to_string()))?
    }

    /// Stop the engine loop and release the chat backend
    pub fn shutdown(&self) -> Result<()> {
        self.send(EngineCommand::Shutdown)
    }
}
