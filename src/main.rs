// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! MineAgent - in-game conversational agent
//!
//! Entry point for the MineAgent CLI. The `console` command stands in for a
//! game server so the agent can be exercised from a terminal.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use mineagent::chat::{AgreementStore, SessionEngine};
use mineagent::cli::{Cli, Commands, ConsoleArgs};
use mineagent::config::Settings;
use mineagent::error::Result;
use mineagent::host::ConsoleHost;
use mineagent::llm::providers::CloudflareClient;
use mineagent::tools::{PresetDirectory, SearchClient, ToolDispatcher};

#[path = "main/console_loop.rs"]
mod console_loop;

use console_loop::run_console_loop;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    // `-v` turns on the agent's own targets; `RUST_LOG` still applies.
    if cli.verbose > 0 {
        for directive in [
            "mineagent.chat.engine=debug",
            "mineagent.llm=debug",
            "mineagent.tools=debug",
            "mineagent.search=debug",
            "mineagent.config=debug",
        ] {
            if let Ok(parsed) = directive.parse() {
                env_filter = env_filter.add_directive(parsed);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let settings_path = cli.config.clone().unwrap_or_else(Settings::default_path);
    let settings = Settings::load_from(&settings_path)?;

    match &cli.command {
        None => run_console(&ConsoleArgs::default(), settings, settings_path).await?,
        Some(Commands::Console(args)) => run_console(args, settings, settings_path).await?,
        Some(Commands::Init) => run_init(&settings, &settings_path)?,
        Some(Commands::Check) => run_check(&settings)?,
    }

    Ok(())
}

fn run_init(settings: &Settings, path: &Path) -> Result<()> {
    Settings::ensure_directories()?;
    settings.save_to(path)?;
    println!("Settings written to {}", path.display());
    println!("Preset files go in {}", Settings::preset_dir().display());
    Ok(())
}

fn run_check(settings: &Settings) -> Result<()> {
    settings.validate()?;
    println!("Settings are valid.");
    match settings.get_cloudflare_api_key() {
        Some(_) => println!("Cloudflare API key: found"),
        None => println!(
            "Cloudflare API key: missing (set {} or cloudflare.api_key)",
            settings.cloudflare.api_key_env
        ),
    }
    println!("Model: {}", settings.cloudflare.model);
    Ok(())
}

async fn run_console(args: &ConsoleArgs, settings: Settings, settings_path: PathBuf) -> Result<()> {
    settings.validate()?;
    Settings::ensure_directories()?;

    let mut client = CloudflareClient::from_settings(&settings)?;
    if let Some(model) = &args.model {
        client = client.with_model(model.clone());
    }
    let search = SearchClient::new(client.http_client(), settings.search.clone());
    let presets = PresetDirectory::new(Settings::preset_dir());
    let agreements = AgreementStore::load(Settings::agreement_path())?;
    let host = Arc::new(ConsoleHost::new(args.name.clone()).with_commands(args.commands.clone()));

    let user = args
        .user
        .map(mineagent::host::UserId::from_uuid)
        .unwrap_or_default();

    let dispatcher = ToolDispatcher::new(Arc::new(presets), Arc::new(search));
    let (engine, handle) = SessionEngine::new(
        settings.session.clone(),
        Arc::new(client),
        host.clone(),
        dispatcher,
        agreements,
    );
    let task = tokio::spawn(engine.with_settings_path(settings_path).run());

    println!("MineAgent console as {} ({})", args.name, user);
    println!("Type /cli to start a session. Ctrl-D quits.");

    let result = run_console_loop(&handle, host.as_ref(), user, &args.name).await;

    // The engine may already be gone; nothing to report then.
    let _ = handle.shutdown();
    let _ = task.await;
    result
}
