// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use tokio::io::{AsyncBufReadExt, BufReader};

use mineagent::chat::{EngineHandle, ReloadScope};
use mineagent::error::Result;
use mineagent::host::{HostRuntime, UserId};

/// One line typed at the console
#[derive(Debug, PartialEq, Eq)]
pub enum ConsoleInput {
    Toggle,
    Confirm,
    Cancel,
    Status,
    Reload(ReloadScope),
    /// Malformed subcommand; the text explains the syntax
    Usage(&'static str),
    /// `/cli select <option>`, delivered as if typed in chat
    Select(String),
    Chat(String),
    Empty,
}

pub fn parse_console_line(line: &str) -> ConsoleInput {
    let line = line.trim();
    if line.is_empty() {
        return ConsoleInput::Empty;
    }

    let Some(rest) = line.strip_prefix("/cli") else {
        return ConsoleInput::Chat(line.to_string());
    };
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return ConsoleInput::Chat(line.to_string());
    }

    let rest = rest.trim();
    let (sub, arg) = match rest.split_once(char::is_whitespace) {
        Some((sub, arg)) => (sub, arg.trim()),
        None => (rest, ""),
    };
    match sub {
        "" => ConsoleInput::Toggle,
        "confirm" => ConsoleInput::Confirm,
        "cancel" => ConsoleInput::Cancel,
        "status" => ConsoleInput::Status,
        "reload" => match arg {
            "" => ConsoleInput::Reload(ReloadScope::All),
            "workspace" => ConsoleInput::Reload(ReloadScope::Workspace),
            "config" => ConsoleInput::Reload(ReloadScope::Config),
            _ => ConsoleInput::Usage("usage: /cli reload [workspace|config]"),
        },
        "select" if !arg.is_empty() => ConsoleInput::Select(arg.to_string()),
        _ => ConsoleInput::Chat(line.to_string()),
    }
}

/// Feed stdin to the engine until EOF
pub async fn run_console_loop(
    handle: &EngineHandle,
    host: &dyn HostRuntime,
    user: UserId,
    name: &str,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        match parse_console_line(&line) {
            ConsoleInput::Empty => {}
            ConsoleInput::Toggle => handle.on_toggle_request(user)?,
            ConsoleInput::Confirm => handle.on_confirm_request(user)?,
            ConsoleInput::Cancel => handle.on_cancel_request(user)?,
            ConsoleInput::Status => {
                let status = handle.status().await?;
                host.send_text(
                    user,
                    &format!(
                        "mineagent {} on {}  sessions: {}  pending agreements: {}  generating: {}  commands: {}  presets: {}",
                        env!("CARGO_PKG_VERSION"),
                        status.host_version,
                        status.active_sessions,
                        status.pending_agreements,
                        status.generating,
                        status.indexed_commands,
                        status.indexed_presets
                    ),
                );
            }
            ConsoleInput::Reload(scope) => match handle.reload(scope).await {
                Ok(report) => {
                    let settings = if report.config_reloaded {
                        "settings reloaded, "
                    } else {
                        ""
                    };
                    host.send_text(
                        user,
                        &format!(
                            "{}indexed {} commands and {} presets",
                            settings, report.indexed_commands, report.indexed_presets
                        ),
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, "reload failed");
                    host.send_text(user, &format!("reload failed: {}", e));
                }
            },
            ConsoleInput::Usage(text) => host.send_text(user, text),
            ConsoleInput::Select(text) | ConsoleInput::Chat(text) => {
                if !handle.on_user_message(user, text.as_str()).await {
                    // Outside a session the line is ordinary chat.
                    host.send_text(user, &format!("<{}> {}", name, text));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_and_subcommands() {
        assert_eq!(parse_console_line("/cli"), ConsoleInput::Toggle);
        assert_eq!(parse_console_line("  /cli  "), ConsoleInput::Toggle);
        assert_eq!(parse_console_line("/cli confirm"), ConsoleInput::Confirm);
        assert_eq!(parse_console_line("/cli cancel"), ConsoleInput::Cancel);
        assert_eq!(parse_console_line("/cli status"), ConsoleInput::Status);
    }

    #[test]
    fn test_reload_scopes() {
        assert_eq!(
            parse_console_line("/cli reload"),
            ConsoleInput::Reload(ReloadScope::All)
        );
        assert_eq!(
            parse_console_line("/cli reload workspace"),
            ConsoleInput::Reload(ReloadScope::Workspace)
        );
        assert_eq!(
            parse_console_line("/cli reload config"),
            ConsoleInput::Reload(ReloadScope::Config)
        );
        assert!(matches!(
            parse_console_line("/cli reload everything"),
            ConsoleInput::Usage(_)
        ));
    }

    #[test]
    fn test_select_carries_option() {
        assert_eq!(
            parse_console_line("/cli select dark oak"),
            ConsoleInput::Select("dark oak".to_string())
        );
        assert_eq!(
            parse_console_line("/cli select"),
            ConsoleInput::Chat("/cli select".to_string())
        );
    }

    #[test]
    fn test_plain_lines_are_chat() {
        assert_eq!(parse_console_line(""), ConsoleInput::Empty);
        assert_eq!(
            parse_console_line("hello there"),
            ConsoleInput::Chat("hello there".to_string())
        );
        assert_eq!(
            parse_console_line("/clix"),
            ConsoleInput::Chat("/clix".to_string())
        );
    }
}
