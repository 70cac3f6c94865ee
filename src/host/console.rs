// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Console host
//!
//! A stand-in game server for one local user: text goes to a terminal and
//! commands run through `sh -c`.

use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};

use super::{CommandOutcome, HostRuntime, OutputSink, UserId};

pub struct ConsoleHost {
    name: String,
    out: Mutex<Box<dyn Write + Send>>,
    commands: Vec<String>,
}

impl ConsoleHost {
    /// Console host writing to stdout
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_writer(name, Box::new(std::io::stdout()))
    }

    pub fn with_writer(name: impl Into<String>, out: Box<dyn Write + Send>) -> Self {
        Self {
            name: name.into(),
            out: Mutex::new(out),
            commands: Vec::new(),
        }
    }

    /// Commands advertised to the agent
    pub fn with_commands(mut self, commands: Vec<String>) -> Self {
        self.commands = commands;
        self
    }

    fn print(&self, text: &str) {
        let mut out = match self.out.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Terminal output failures are not actionable here.
        let _ = writeln!(out, "{}", text);
        let _ = out.flush();
    }

    fn shell(command: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command).stdin(Stdio::null());
        cmd
    }
}

impl HostRuntime for ConsoleHost {
    fn send_text(&self, _user: UserId, text: &str) {
        self.print(text);
    }

    fn send_choice(&self, _user: UserId, options: &[String]) {
        self.print(&format!("⨀ [ {} ]", options.join(" | ")));
        self.print("  pick one by typing it, or /cli select <option>");
    }

    fn send_confirmation(&self, _user: UserId, command: &str) {
        self.print(&format!("⇒ {}  [Y] / [N]   (/cli confirm, /cli cancel)", command));
    }

    fn execute_as_user(
        &self,
        _user: UserId,
        command: &str,
        sink: Arc<dyn OutputSink>,
    ) -> CommandOutcome {
        match Self::shell(command).output() {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                for line in stdout.lines().chain(stderr.lines()) {
                    sink.write(line);
                }
                CommandOutcome::Completed {
                    success: output.status.success(),
                }
            }
            Err(e) => {
                tracing::warn!(target: "mineagent.tools", %command, error = %e, "failed to spawn shell");
                CommandOutcome::Completed { success: false }
            }
        }
    }

    fn execute_direct(&self, _user: UserId, command: &str) -> bool {
        Self::shell(command)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn version(&self) -> String {
        format!("console (mineagent {})", env!("CARGO_PKG_VERSION"))
    }

    fn display_name(&self, _user: UserId) -> String {
        self.name.clone()
    }

    fn command_index(&self) -> Vec<String> {
        self.commands.clone()
    }
}
