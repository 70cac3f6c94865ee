// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// MineAgent - in-game conversational agent, run against a local console
#[derive(Parser, Debug)]
#[command(name = "mineagent")]
#[command(version, about = "In-game conversational agent for game servers")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Settings file path (defaults to ~/.mineagent/settings.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the console session (default when no command given)
    Console(ConsoleArgs),

    /// Write default settings and create the data directories
    Init,

    /// Validate settings and report whether a credential is available
    Check,
}

/// Arguments for the console session
#[derive(clap::Args, Debug)]
pub struct ConsoleArgs {
    /// Identity of the local user (random when omitted)
    #[arg(long)]
    pub user: Option<Uuid>,

    /// Display name of the local user
    #[arg(long, default_value = "Player")]
    pub name: String,

    /// Model override
    #[arg(short, long)]
    pub model: Option<String>,

    /// Commands advertised to the agent (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub commands: Vec<String>,
}

impl Default for ConsoleArgs {
    fn default() -> Self {
        Self {
            user: None,
            name: "Player".to_string(),
            model: None,
            commands: Vec::new(),
        }
    }
}

impl Cli {
    /// Arguments of an explicit `console` command
    pub fn console_args(&self) -> Option<&ConsoleArgs> {
        match &self.command {
            Some(Commands::Console(args)) => Some(args),
            _ => None,
        }
    }
}
