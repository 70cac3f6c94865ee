// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Host runtime boundary
//!
//! The agent core never talks to the game server directly. Everything it
//! needs from the outside world goes through [`HostRuntime`], and command
//! output comes back through an [`OutputSink`].

pub mod console;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use console::ConsoleHost;

/// Stable identity of a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Receives text a command produces while running as a user
pub trait OutputSink: Send + Sync {
    fn write(&self, text: &str);
}

/// What the host could tell us about a command it ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The command ran; any output went through the sink
    Completed { success: bool },
    /// The host cannot route this command's output through a sink
    CaptureUnsupported,
}

/// Everything the agent core needs from the game server.
///
/// Calls arrive from the engine loop and must not block for long. The
/// `execute_*` methods are the exception: they run on a blocking worker
/// and may wait for the command to exit.
pub trait HostRuntime: Send + Sync {
    /// Show a single line of text to a user
    fn send_text(&self, user: UserId, text: &str);

    /// Render clickable options; a selection comes back as ordinary input
    fn send_choice(&self, user: UserId, options: &[String]);

    /// Present a yes/no affordance for a staged command
    fn send_confirmation(&self, user: UserId, command: &str) {
        self.send_text(user, &format!("Run /{}?  [Y] / [N]", command));
    }

    /// Run a command with the user's privileges, routing its output to `sink`
    fn execute_as_user(
        &self,
        user: UserId,
        command: &str,
        sink: Arc<dyn OutputSink>,
    ) -> CommandOutcome;

    /// Run a command under the user's identity without capturing output
    fn execute_direct(&self, user: UserId, command: &str) -> bool;

    /// Host version string for the system prompt
    fn version(&self) -> String {
        "unknown".to_string()
    }

    /// Name the user is shown as
    fn display_name(&self, user: UserId) -> String {
        user.to_string()
    }

    /// Commands the host offers, for the system prompt
    fn command_index(&self) -> Vec<String> {
        Vec::new()
    }
}
