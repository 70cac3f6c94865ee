// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool system for MineAgent
//!
//! The agent asks for side effects by ending a reply with a directive.
//! This module names the tools, plans what each directive does and
//! carries out the parts that run off the engine loop.

pub mod dispatcher;
pub mod presets;
pub mod run;
pub mod search;

pub use dispatcher::ToolDispatcher;
pub use presets::{PresetDirectory, PresetSource};
pub use run::{CapturingSink, CommandRunner, PendingRun};
pub use search::{SearchBackend, SearchClient};

use futures::future::BoxFuture;

/// Feedback prefixes for results injected back into the conversation
pub const RUN_RESULT: &str = "run_result: ";
pub const GET_RESULT: &str = "get_result: ";
pub const CHOOSE_RESULT: &str = "choose_result: ";
pub const SEARCH_RESULT: &str = "search_result: ";
pub const ERROR_RESULT: &str = "error: ";

/// Tools the agent may invoke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    /// Turn finished, wait for the user
    Over,
    /// Leave the session
    Exit,
    /// Run a server command after the user confirms
    Run,
    /// Read a preset file
    Get,
    /// Offer the user a set of options
    Choose,
    /// Search the wiki or the web
    Search,
}

impl ToolKind {
    pub const ALL: [ToolKind; 6] = [
        ToolKind::Over,
        ToolKind::Exit,
        ToolKind::Run,
        ToolKind::Get,
        ToolKind::Choose,
        ToolKind::Search,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::Over => "over",
            ToolKind::Exit => "exit",
            ToolKind::Run => "run",
            ToolKind::Get => "get",
            ToolKind::Choose => "choose",
            ToolKind::Search => "search",
        }
    }

    /// Look up a tool by directive name, with or without the sentinel
    pub fn from_directive_name(name: &str) -> Option<Self> {
        let bare = name.trim().trim_start_matches('#');
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(bare))
    }

    /// True when `text` starts with `#` followed by a known tool name
    pub fn matches_prefix(text: &str) -> bool {
        let Some(rest) = text.strip_prefix('#') else {
            return false;
        };
        Self::ALL.into_iter().any(|kind| {
            rest.get(..kind.name().len())
                .is_some_and(|head| head.eq_ignore_ascii_case(kind.name()))
        })
    }

    /// Whether the engine echoes `〇 #name` when the tool fires.
    /// Run and search render their own progress lines.
    pub fn echoes_name(&self) -> bool {
        !matches!(self, ToolKind::Run | ToolKind::Search)
    }
}

/// What the engine should do with a directive
pub enum ToolAction {
    /// Turn is over; return to idle
    Finish,
    /// Close the session
    Exit,
    /// Stage a command for y/n confirmation
    Confirm(String),
    /// Offer options; the next input is the selection
    Choose(Vec<String>),
    /// Feed this text back immediately
    Feedback(String),
    /// Feed the future's output back once it resolves
    Deferred(BoxFuture<'static, String>),
}

impl std::fmt::Debug for ToolAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolAction::Finish => write!(f, "Finish"),
            ToolAction::Exit => write!(f, "Exit"),
            ToolAction::Confirm(cmd) => f.debug_tuple("Confirm").field(cmd).finish(),
            ToolAction::Choose(options) => f.debug_tuple("Choose").field(options).finish(),
            ToolAction::Feedback(text) => f.debug_tuple("Feedback").field(text).finish(),
            ToolAction::Deferred(_) => write!(f, "Deferred(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_directive_name() {
        assert_eq!(ToolKind::from_directive_name("#run"), Some(ToolKind::Run));
        assert_eq!(ToolKind::from_directive_name("SEARCH"), Some(ToolKind::Search));
        assert_eq!(ToolKind::from_directive_name("#foobar"), None);
        assert_eq!(ToolKind::from_directive_name("#runx"), None);
    }

    #[test]
    fn test_matches_prefix() {
        assert!(ToolKind::matches_prefix("#over"));
        assert!(ToolKind::matches_prefix("#Choose: a, b"));
        assert!(ToolKind::matches_prefix("#runx"));
        assert!(!ToolKind::matches_prefix("#3 diamonds"));
        assert!(!ToolKind::matches_prefix("run: x"));
        assert!(!ToolKind::matches_prefix("#"));
    }

    #[test]
    fn test_matches_prefix_multibyte_safe() {
        assert!(!ToolKind::matches_prefix("#日本語です"));
    }

    #[test]
    fn test_echoes_name() {
        assert!(ToolKind::Get.echoes_name());
        assert!(ToolKind::Over.echoes_name());
        assert!(!ToolKind::Run.echoes_name());
        assert!(!ToolKind::Search.echoes_name());
    }
}
