// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Directive dispatch
//!
//! Turns a parsed directive into a [`ToolAction`]. Anything that needs I/O
//! comes back as a deferred future so the engine loop never waits on it.

use std::sync::Arc;

use futures::FutureExt;

use crate::chat::directive::Directive;
use crate::error::{AgentError, Result};
use crate::tools::presets::PresetSource;
use crate::tools::search::SearchBackend;
use crate::tools::{ToolAction, ToolKind, ERROR_RESULT, GET_RESULT, SEARCH_RESULT};

/// Plans the effect of each directive
#[derive(Clone)]
pub struct ToolDispatcher {
    presets: Arc<dyn PresetSource>,
    search: Arc<dyn SearchBackend>,
}

impl ToolDispatcher {
    pub fn new(presets: Arc<dyn PresetSource>, search: Arc<dyn SearchBackend>) -> Self {
        Self { presets, search }
    }

    pub fn presets(&self) -> &Arc<dyn PresetSource> {
        &self.presets
    }

    /// Decide what a directive does. Argument problems and unknown tools
    /// become feedback so the agent can correct itself.
    pub fn plan(&self, directive: &Directive) -> ToolAction {
        let Some(kind) = directive.kind() else {
            tracing::info!(target: "mineagent.tools", name = %directive.name, "unknown tool");
            return ToolAction::Feedback(format!("{}unknown tool {}", ERROR_RESULT, directive.name));
        };

        let planned = match kind {
            ToolKind::Over => Ok(ToolAction::Finish),
            ToolKind::Exit => Ok(ToolAction::Exit),
            ToolKind::Run => run_command(&directive.args).map(ToolAction::Confirm),
            ToolKind::Choose => choose_options(&directive.args).map(ToolAction::Choose),
            ToolKind::Get => Ok(self.get(directive.args.clone())),
            ToolKind::Search => self.search(directive.args.clone()),
        };

        planned.unwrap_or_else(|err| {
            tracing::debug!(target: "mineagent.tools", tool = kind.name(), error = %err, "tool argument error");
            ToolAction::Feedback(argument_feedback(&err))
        })
    }

    fn get(&self, name: String) -> ToolAction {
        let presets = Arc::clone(&self.presets);
        ToolAction::Deferred(
            async move {
                match presets.read(&name).await {
                    Ok(Some(content)) => format!("{}{}", GET_RESULT, content),
                    Ok(None) => format!("{}file not found", GET_RESULT),
                    Err(e) => {
                        tracing::warn!(target: "mineagent.tools", %name, error = %e, "preset read failed");
                        format!("{}failed to read file - {}", GET_RESULT, e)
                    }
                }
            }
            .boxed(),
        )
    }

    fn search(&self, query: String) -> Result<ToolAction> {
        if query.trim().is_empty() {
            return Err(AgentError::ToolArgument(
                "#search needs a query, e.g. #search: creeper".to_string(),
            ));
        }
        let search = Arc::clone(&self.search);
        Ok(ToolAction::Deferred(
            async move { format!("{}{}", SEARCH_RESULT, search.search(&query).await) }.boxed(),
        ))
    }
}

/// Command text for a `#run`, minus one leading slash
fn run_command(args: &str) -> Result<String> {
    let args = args.trim();
    let command = args.strip_prefix('/').unwrap_or(args).trim();
    if command.is_empty() {
        return Err(AgentError::ToolArgument(
            "#run needs a command, e.g. #run: say hello".to_string(),
        ));
    }
    Ok(command.to_string())
}

/// Comma-separated options for a `#choose`
fn choose_options(args: &str) -> Result<Vec<String>> {
    let options: Vec<String> = args
        .split(',')
        .map(str::trim)
        .filter(|opt| !opt.is_empty())
        .map(str::to_string)
        .collect();
    if options.is_empty() {
        return Err(AgentError::ToolArgument(
            "#choose needs comma-separated options, e.g. #choose: oak, birch".to_string(),
        ));
    }
    Ok(options)
}

fn argument_feedback(err: &AgentError) -> String {
    match err {
        AgentError::ToolArgument(msg) => format!("{}{}", ERROR_RESULT, msg),
        other => format!("{}{}", ERROR_RESULT, other),
    }
}
