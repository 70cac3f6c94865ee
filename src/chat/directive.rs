// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool directive parsing
//!
//! The agent ends a reply with at most one directive of the form
//! `#name: args`. Prose may contain `#` too, so only the last `#` that
//! starts a known tool name counts.

use std::sync::OnceLock;

use regex::Regex;

use crate::tools::ToolKind;

/// Sentinel that opens a directive
pub const SENTINEL: char = '#';

/// A reply split into what the user sees and what the agent asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    pub display: String,
    pub directive: Option<Directive>,
}

/// A tool invocation taken from the end of a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// Everything from the sentinel to the end of the reply
    pub raw: String,
    /// Tool name including the sentinel, as written
    pub name: String,
    /// Argument text, possibly empty
    pub args: String,
}

impl Directive {
    /// Split directive text into name and arguments at the first colon
    /// or space, whichever comes first.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let (name, args) = match raw.find([':', ' ']) {
            Some(idx) => (raw[..idx].trim(), raw[idx + 1..].trim()),
            None => (raw, ""),
        };
        Self {
            raw: raw.to_string(),
            name: name.to_string(),
            args: args.to_string(),
        }
    }

    /// The tool this directive names, if it is one we know
    pub fn kind(&self) -> Option<ToolKind> {
        ToolKind::from_directive_name(&self.name)
    }
}

fn thought_block() -> Option<&'static Regex> {
    static THOUGHT: OnceLock<Option<Regex>> = OnceLock::new();
    THOUGHT
        .get_or_init(|| Regex::new(r"(?is)<(?:thought|think)>.*?</(?:thought|think)>").ok())
        .as_ref()
}

fn leading_thought_line() -> Option<&'static Regex> {
    static LEADING: OnceLock<Option<Regex>> = OnceLock::new();
    LEADING
        .get_or_init(|| Regex::new(r"(?i)\A\s*(?:thought|思考过程)\s*[:：][^\n]*\n").ok())
        .as_ref()
}

/// Remove reasoning markup the model may emit before its answer
pub fn strip_thoughts(reply: &str) -> String {
    let mut text = match thought_block() {
        Some(re) => re.replace_all(reply, "").into_owned(),
        None => reply.to_string(),
    };
    if let Some(re) = leading_thought_line() {
        text = re.replace(&text, "").into_owned();
    }
    text.trim().to_string()
}

/// Split a raw reply into display text and an optional trailing directive
pub fn parse_reply(raw: &str) -> ParsedReply {
    let cleaned = strip_thoughts(raw);

    if let Some(idx) = cleaned.rfind(SENTINEL) {
        let candidate = cleaned[idx..].trim();
        if ToolKind::matches_prefix(candidate) {
            return ParsedReply {
                display: cleaned[..idx].trim().to_string(),
                directive: Some(Directive::parse(candidate)),
            };
        }
    }

    ParsedReply {
        display: cleaned,
        directive: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_directive_split() {
        let parsed = parse_reply("The weather is now clear. #run: weather clear");
        assert_eq!(parsed.display, "The weather is now clear.");

        let directive = parsed.directive.unwrap();
        assert_eq!(directive.raw, "#run: weather clear");
        assert_eq!(directive.name, "#run");
        assert_eq!(directive.args, "weather clear");
        assert_eq!(directive.kind(), Some(ToolKind::Run));
    }

    #[test]
    fn test_no_directive() {
        let parsed = parse_reply("Just chatting.");
        assert_eq!(parsed.display, "Just chatting.");
        assert!(parsed.directive.is_none());
    }

    #[test]
    fn test_hash_in_prose_is_not_a_directive() {
        let parsed = parse_reply("You need item #3 from the chest.");
        assert_eq!(parsed.display, "You need item #3 from the chest.");
        assert!(parsed.directive.is_none());
    }

    #[test]
    fn test_only_last_hash_is_considered() {
        // The last `#` is prose, so the earlier #run is not picked up.
        let parsed = parse_reply("#run: say hi then grab item #3");
        assert!(parsed.directive.is_none());
    }

    #[test]
    fn test_directive_case_insensitive() {
        let parsed = parse_reply("Done! #OVER");
        assert_eq!(parsed.display, "Done!");
        assert_eq!(parsed.directive.unwrap().kind(), Some(ToolKind::Over));
    }

    #[test]
    fn test_space_separator() {
        let directive = Directive::parse("#get rules.txt");
        assert_eq!(directive.name, "#get");
        assert_eq!(directive.args, "rules.txt");
    }

    #[test]
    fn test_first_of_colon_or_space_wins() {
        let directive = Directive::parse("#run tp @s 0 64 0: now");
        assert_eq!(directive.name, "#run");
        assert_eq!(directive.args, "tp @s 0 64 0: now");

        let directive = Directive::parse("#search:widely rust lang");
        assert_eq!(directive.name, "#search");
        assert_eq!(directive.args, "widely rust lang");
    }

    #[test]
    fn test_bare_name_has_empty_args() {
        let directive = Directive::parse("#exit");
        assert_eq!(directive.name, "#exit");
        assert_eq!(directive.args, "");
    }

    #[test]
    fn test_directive_only_reply() {
        let parsed = parse_reply("#over");
        assert_eq!(parsed.display, "");
        assert_eq!(parsed.directive.unwrap().name, "#over");
    }

    #[test]
    fn test_prefix_match_keeps_unknown_name() {
        let parsed = parse_reply("hmm #runx: y");
        let directive = parsed.directive.unwrap();
        assert_eq!(directive.name, "#runx");
        assert_eq!(directive.kind(), None);
    }

    #[test]
    fn test_strip_thought_tags() {
        let parsed = parse_reply("<thought>plan it out\nstep 2</thought>Here you go. #over");
        assert_eq!(parsed.display, "Here you go.");
    }

    #[test]
    fn test_strip_leading_thought_line() {
        assert_eq!(strip_thoughts("Thought: check time\nIt is noon."), "It is noon.");
        assert_eq!(strip_thoughts("思考过程: 看看\n好的"), "好的");
    }

    #[test]
    fn test_thought_line_only_stripped_at_start() {
        let text = "Answer first.\nThought: this stays";
        assert_eq!(strip_thoughts(text), text);
    }

    #[test]
    fn test_hash_inside_thought_ignored() {
        let parsed = parse_reply("<thought>maybe #run: kill @a</thought>Nope.");
        assert_eq!(parsed.display, "Nope.");
        assert!(parsed.directive.is_none());
    }
}
