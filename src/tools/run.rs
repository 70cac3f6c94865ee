// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Command execution with output capture
//!
//! A confirmed `#run` executes on the host as the user. Everything the
//! command prints goes through a [`CapturingSink`], which shows it to the
//! user and keeps a clean copy for the agent.

use std::sync::{Arc, Mutex};

use crate::host::{CommandOutcome, HostRuntime, OutputSink, UserId};

/// Host formatting code marker; the following character is the code
const FORMAT_MARKER: char = '§';

/// Remove `§x` formatting codes from text
pub fn strip_formatting(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == FORMAT_MARKER {
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}

/// Sink that mirrors output to the user and records a stripped copy
pub struct CapturingSink {
    user: UserId,
    host: Arc<dyn HostRuntime>,
    captured: Mutex<Vec<String>>,
}

impl CapturingSink {
    pub fn new(user: UserId, host: Arc<dyn HostRuntime>) -> Self {
        Self {
            user,
            host,
            captured: Mutex::new(Vec::new()),
        }
    }

    /// Everything captured so far, one line per write
    pub fn captured(&self) -> String {
        match self.captured.lock() {
            Ok(lines) => lines.join("\n"),
            Err(poisoned) => poisoned.into_inner().join("\n"),
        }
    }
}

impl OutputSink for CapturingSink {
    fn write(&self, text: &str) {
        self.host.send_text(self.user, text);
        let clean = strip_formatting(text);
        match self.captured.lock() {
            Ok(mut lines) => lines.push(clean),
            Err(poisoned) => poisoned.into_inner().push(clean),
        }
    }
}

/// A command that has been handed to the host; its result is read later
/// so output that arrives after dispatch is still collected.
pub struct PendingRun {
    command: String,
    sink: Arc<CapturingSink>,
    success: bool,
}

impl PendingRun {
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn success(&self) -> bool {
        self.success
    }

    /// Feedback text (without prefix): captured output if there is any,
    /// otherwise an outcome inferred from the command and its status.
    pub fn finish(&self) -> String {
        let captured = self.sink.captured();
        if captured.trim().is_empty() {
            infer_outcome(&self.command, self.success)
        } else {
            captured
        }
    }
}

/// Describe a command's result when it printed nothing we could see
pub fn infer_outcome(command: &str, success: bool) -> String {
    if !success {
        return "Command failed. Likely causes:\n\
                1. syntax error in the command\n\
                2. insufficient permission\n\
                3. the command's output cannot be captured\n\
                Check the syntax or try another approach."
            .to_string();
    }

    let verb = command
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_lowercase();
    match verb.as_str() {
        "tp" | "teleport" => {
            "Command succeeded (teleport commands normally produce no text).".to_string()
        }
        "op" | "deop" => {
            "Command succeeded (permission changes are normally silent or console-only)."
                .to_string()
        }
        _ => "Command executed, no output captured (it may be silent or shown only on the player's screen).".to_string(),
    }
}

/// Executes confirmed commands on the host
#[derive(Clone)]
pub struct CommandRunner {
    host: Arc<dyn HostRuntime>,
}

impl CommandRunner {
    pub fn new(host: Arc<dyn HostRuntime>) -> Self {
        Self { host }
    }

    /// Run `command` as `user`, capturing output where the host allows it.
    /// May block for as long as the host takes to run the command.
    pub fn execute(&self, user: UserId, command: &str) -> PendingRun {
        let sink = Arc::new(CapturingSink::new(user, Arc::clone(&self.host)));
        let outcome = self.host.execute_as_user(user, command, sink.clone());

        let success = match outcome {
            CommandOutcome::Completed { success } => success,
            CommandOutcome::CaptureUnsupported => {
                tracing::debug!(
                    target: "mineagent.tools",
                    %user,
                    %command,
                    "capture unsupported, executing directly"
                );
                self.host.execute_direct(user, command)
            }
        };

        tracing::info!(target: "mineagent.tools", %user, %command, success, "command dispatched");
        PendingRun {
            command: command.to_string(),
            sink,
            success,
        }
    }
}
