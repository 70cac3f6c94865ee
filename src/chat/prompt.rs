// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! System prompt for the agent

use std::fmt::Write;
use std::sync::Arc;

use crate::host::{HostRuntime, UserId};
use crate::tools::PresetSource;

/// Builds the per-user system prompt from host and preset state.
///
/// The command and preset indexes are read once and kept until
/// [`PromptBuilder::refresh`] is called.
pub struct PromptBuilder {
    host: Arc<dyn HostRuntime>,
    presets: Arc<dyn PresetSource>,
    commands: Vec<String>,
    preset_names: Vec<String>,
}

impl PromptBuilder {
    pub fn new(host: Arc<dyn HostRuntime>, presets: Arc<dyn PresetSource>) -> Self {
        let mut builder = Self {
            host,
            presets,
            commands: Vec::new(),
            preset_names: Vec::new(),
        };
        builder.refresh();
        builder
    }

    /// Re-read the host command index and the preset directory
    pub fn refresh(&mut self) {
        // Namespaced aliases (plugin:command) only add noise.
        self.commands = self
            .host
            .command_index()
            .into_iter()
            .filter(|name| !name.contains(':'))
            .collect();
        self.preset_names = self.presets.index();
        tracing::debug!(
            target: "mineagent.chat.engine",
            commands = self.commands.len(),
            presets = self.preset_names.len(),
            "workspace indexed"
        );
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    pub fn preset_count(&self) -> usize {
        self.preset_names.len()
    }

    pub fn build(&self, user: UserId) -> String {
        let mut prompt = String::new();
        let _ = writeln!(
            prompt,
            "You are MineAgent, an assistant inside a Minecraft server. You help the player by talking with them and running server commands on their behalf."
        );
        let _ = writeln!(prompt, "Server version: {}", self.host.version());
        let _ = writeln!(prompt, "You are talking to: {}", self.host.display_name(user));
        let _ = writeln!(prompt, "Available commands: {}", join_or_none(&self.commands));
        let _ = writeln!(prompt, "Available preset files: {}", join_or_none(&self.preset_names));
        prompt.push_str(TOOL_RULES);
        prompt
    }
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

const TOOL_RULES: &str = "
Rules:
1. Do not use Markdown formatting. Wrap key words such as commands or item names in ** ** to highlight them.
2. You may call one tool per reply. The call goes on its own line at the very end of the reply, written as #name: arguments.
   #search: <query> searches the Minecraft Wiki. #search: widely <query> searches the whole web.
   #choose: <A>,<B>,<C> shows the player options to pick from.
   #get: <file> reads a preset file.
   #run: <command> runs a command as the player. Never put a leading slash on the command, e.g. #run: give @p apple
   #over ends your turn.
   #exit closes the session when the player wants to leave.
3. Before running a third-party plugin command whose syntax you are unsure of, read the matching preset with #get. Only search when no preset covers it.
4. Tool results come back as messages starting with run_result:, get_result:, choose_result:, search_result: or error:.
5. If a run_result says no output was captured, the command probably ran silently or printed straight to the player's screen. Do not repeat it blindly; tell the player to check their chat or try another approach.
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::host::{CommandOutcome, OutputSink};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct PromptHost;

    impl HostRuntime for PromptHost {
        fn send_text(&self, _user: UserId, _text: &str) {}
        fn send_choice(&self, _user: UserId, _options: &[String]) {}
        fn execute_as_user(
            &self,
            _user: UserId,
            _command: &str,
            _sink: Arc<dyn OutputSink>,
        ) -> CommandOutcome {
            CommandOutcome::CaptureUnsupported
        }
        fn execute_direct(&self, _user: UserId, _command: &str) -> bool {
            true
        }
        fn version(&self) -> String {
            "1.21.1-R0.1".to_string()
        }
        fn display_name(&self, _user: UserId) -> String {
            "Steve".to_string()
        }
        fn command_index(&self) -> Vec<String> {
            vec!["give".into(), "minecraft:give".into(), "weather".into()]
        }
    }

    struct TwoPresets;

    #[async_trait]
    impl PresetSource for TwoPresets {
        async fn read(&self, _name: &str) -> Result<Option<String>> {
            Ok(None)
        }
        fn index(&self) -> Vec<String> {
            vec!["luckperms.txt".into(), "essentials.txt".into()]
        }
    }

    #[derive(Default)]
    struct CountingPresets {
        scans: AtomicUsize,
    }

    #[async_trait]
    impl PresetSource for CountingPresets {
        async fn read(&self, _name: &str) -> Result<Option<String>> {
            Ok(None)
        }
        fn index(&self) -> Vec<String> {
            let scan = self.scans.fetch_add(1, Ordering::SeqCst);
            (0..=scan).map(|i| format!("preset{}.txt", i)).collect()
        }
    }

    #[test]
    fn test_prompt_includes_host_context() {
        let builder = PromptBuilder::new(Arc::new(PromptHost), Arc::new(TwoPresets));
        let prompt = builder.build(UserId::new());

        assert!(prompt.contains("1.21.1-R0.1"));
        assert!(prompt.contains("Steve"));
        assert!(prompt.contains("give, weather"));
        assert!(!prompt.contains("minecraft:give"));
        assert!(prompt.contains("luckperms.txt, essentials.txt"));
        assert!(prompt.contains("#run: <command>"));
    }

    #[test]
    fn test_index_cached_until_refresh() {
        let presets = Arc::new(CountingPresets::default());
        let mut builder = PromptBuilder::new(Arc::new(PromptHost), presets.clone());
        let user = UserId::new();

        builder.build(user);
        builder.build(user);
        assert_eq!(presets.scans.load(Ordering::SeqCst), 1);
        assert_eq!(builder.preset_count(), 1);
        assert_eq!(builder.command_count(), 2);

        builder.refresh();
        assert_eq!(presets.scans.load(Ordering::SeqCst), 2);
        assert_eq!(builder.preset_count(), 2);
        assert!(builder.build(user).contains("preset0.txt, preset1.txt"));
    }
}
