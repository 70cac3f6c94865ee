// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session engine
//!
//! One actor owns every user's session state. Host requests arrive through
//! an [`EngineHandle`]; chat replies and tool results are computed on
//! spawned tasks and posted back as [`EngineEvent`]s, so all state changes
//! happen on the engine loop.
//!
//! Each asynchronous step carries a generation id. A completion is applied
//! only while the user is still generating under that id; anything else is
//! stale (interrupted, exited, timed out) and is dropped.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::chat::agreement::AgreementStore;
use crate::chat::directive::{parse_reply, Directive};
use crate::chat::handle::{EngineCommand, EngineHandle, EngineStatus, ReloadReport, ReloadScope};
use crate::chat::prompt::PromptBuilder;
use crate::chat::session::{CharRatioEstimator, ConversationSession, TokenEstimator};
use crate::config::{SessionConfig, Settings};
use crate::error::{AgentError, Result};
use crate::host::{HostRuntime, UserId};
use crate::llm::message::{Message, Role};
use crate::llm::provider::ChatBackend;
use crate::tools::run::infer_outcome;
use crate::tools::{
    CommandRunner, ToolAction, ToolDispatcher, ToolKind, CHOOSE_RESULT, RUN_RESULT,
};

const EXIT_KEYWORD: &str = "exit";
const STOP_KEYWORD: &str = "stop";
const YES_KEYWORDS: &[&str] = &["y", "yes"];
const NO_KEYWORDS: &[&str] = &["n", "no"];

/// What a user's session is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    None,
    PendingAgreement,
    ActiveIdle,
    Generating,
    AwaitingConfirm,
    AwaitingChoice,
}

/// An action staged for the user's answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    /// Command waiting for y/n
    Confirm(String),
    /// Options offered; the next input is the selection
    Choice(Vec<String>),
}

/// Completions posted back to the loop by spawned work
#[derive(Debug)]
pub enum EngineEvent {
    ChatFinished {
        user: UserId,
        generation: u64,
        result: Result<String>,
    },
    ToolFeedback {
        user: UserId,
        generation: u64,
        text: String,
    },
}

#[derive(Debug)]
enum Phase {
    Idle,
    Generating(u64),
    Awaiting(PendingAction),
}

enum UserSlot {
    PendingAgreement,
    Active {
        session: ConversationSession,
        phase: Phase,
    },
}

/// Per-user state machine and orchestrator
pub struct SessionEngine {
    config: SessionConfig,
    backend: Arc<dyn ChatBackend>,
    host: Arc<dyn HostRuntime>,
    dispatcher: ToolDispatcher,
    runner: CommandRunner,
    prompts: PromptBuilder,
    agreements: AgreementStore,
    custom_estimator: Option<Arc<dyn TokenEstimator>>,
    settings_path: Option<PathBuf>,
    slots: HashMap<UserId, UserSlot>,
    next_generation: u64,
    commands: mpsc::UnboundedReceiver<EngineCommand>,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
    events_rx: mpsc::UnboundedReceiver<EngineEvent>,
}

impl SessionEngine {
    pub fn new(
        config: SessionConfig,
        backend: Arc<dyn ChatBackend>,
        host: Arc<dyn HostRuntime>,
        dispatcher: ToolDispatcher,
        agreements: AgreementStore,
    ) -> (Self, EngineHandle) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let prompts = PromptBuilder::new(Arc::clone(&host), Arc::clone(dispatcher.presets()));
        let runner = CommandRunner::new(Arc::clone(&host));

        let engine = Self {
            config,
            backend,
            host,
            dispatcher,
            runner,
            prompts,
            agreements,
            custom_estimator: None,
            settings_path: None,
            slots: HashMap::new(),
            next_generation: 0,
            commands,
            events_tx,
            events_rx,
        };
        (engine, EngineHandle::new(commands_tx))
    }

    /// Replace the token estimator used for new sessions
    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.custom_estimator = Some(estimator);
        self
    }

    /// Settings file re-read by a config reload
    pub fn with_settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    fn estimator(&self) -> Arc<dyn TokenEstimator> {
        match &self.custom_estimator {
            Some(estimator) => Arc::clone(estimator),
            None => Arc::new(CharRatioEstimator::new(self.config.chars_per_token)),
        }
    }

    /// Run the engine loop until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        let period = Duration::from_secs(self.config.sweep_interval_secs.max(1));
        let mut sweep = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tracing::info!(target: "mineagent.chat.engine", backend = self.backend.name(), "session engine started");

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(EngineCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(event) = self.events_rx.recv() => self.apply_event(event),
                _ = sweep.tick() => self.sweep_idle_at(Utc::now()),
            }
        }

        self.slots.clear();
        self.backend.shutdown();
        tracing::info!(target: "mineagent.chat.engine", "session engine stopped");
    }

    fn handle_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::UserMessage { user, text, reply } => {
                let handled = self.handle_user_message(user, &text);
                let _ = reply.send(handled);
            }
            EngineCommand::Toggle { user } => self.handle_toggle(user),
            EngineCommand::Confirm { user } => self.handle_confirm(user),
            EngineCommand::Cancel { user } => self.handle_cancel(user),
            EngineCommand::Status { reply } => {
                let _ = reply.send(self.status());
            }
            EngineCommand::Reload { scope, reply } => {
                let _ = reply.send(self.reload(scope));
            }
            EngineCommand::Shutdown => {}
        }
    }

    /// Await the next internal completion and apply it.
    /// Returns false if no completion can arrive.
    pub async fn pump(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(event) => {
                self.apply_event(event);
                true
            }
            None => false,
        }
    }

    // -- Queries --

    pub fn mode(&self, user: UserId) -> SessionMode {
        match self.slots.get(&user) {
            None => SessionMode::None,
            Some(UserSlot::PendingAgreement) => SessionMode::PendingAgreement,
            Some(UserSlot::Active { phase, .. }) => match phase {
                Phase::Idle => SessionMode::ActiveIdle,
                Phase::Generating(_) => SessionMode::Generating,
                Phase::Awaiting(PendingAction::Confirm(_)) => SessionMode::AwaitingConfirm,
                Phase::Awaiting(PendingAction::Choice(_)) => SessionMode::AwaitingChoice,
            },
        }
    }

    pub fn history(&self, user: UserId) -> Option<&[Message]> {
        match self.slots.get(&user) {
            Some(UserSlot::Active { session, .. }) => Some(session.history()),
            _ => None,
        }
    }

    pub fn pending_action(&self, user: UserId) -> Option<&PendingAction> {
        match self.slots.get(&user) {
            Some(UserSlot::Active {
                phase: Phase::Awaiting(action),
                ..
            }) => Some(action),
            _ => None,
        }
    }

    pub fn has_agreed(&self, user: UserId) -> bool {
        self.agreements.contains(user)
    }

    pub fn status(&self) -> EngineStatus {
        let mut status = EngineStatus {
            indexed_commands: self.prompts.command_count(),
            indexed_presets: self.prompts.preset_count(),
            host_version: self.host.version(),
            ..EngineStatus::default()
        };
        for slot in self.slots.values() {
            match slot {
                UserSlot::PendingAgreement => status.pending_agreements += 1,
                UserSlot::Active { phase, .. } => {
                    status.active_sessions += 1;
                    if matches!(phase, Phase::Generating(_)) {
                        status.generating += 1;
                    }
                }
            }
        }
        status
    }

    // -- Inbound --

    /// Route one chat line. Returns true if it belonged to the engine.
    pub fn handle_user_message(&mut self, user: UserId, text: &str) -> bool {
        let text = text.trim();
        let Some(slot) = self.slots.get_mut(&user) else {
            return false;
        };

        let (session, phase) = match slot {
            UserSlot::PendingAgreement => {
                if text.eq_ignore_ascii_case(&self.config.acceptance_token) {
                    self.accept_terms(user);
                } else {
                    let token = self.config.acceptance_token.clone();
                    self.notify(
                        user,
                        &format!("Send {} to accept the terms, or /cli to leave.", token),
                    );
                }
                return true;
            }
            UserSlot::Active { session, phase } => (session, phase),
        };

        if text.eq_ignore_ascii_case(EXIT_KEYWORD) {
            self.exit_session(user);
            return true;
        }
        if text.eq_ignore_ascii_case(STOP_KEYWORD) {
            self.interrupt(user);
            return true;
        }

        match phase {
            Phase::Awaiting(PendingAction::Choice(_)) => {
                *phase = Phase::Idle;
                self.feedback(user, format!("{}{}", CHOOSE_RESULT, text));
            }
            Phase::Awaiting(PendingAction::Confirm(_)) => {
                if is_keyword(text, YES_KEYWORDS) {
                    self.handle_confirm(user);
                } else if is_keyword(text, NO_KEYWORDS) {
                    self.handle_cancel(user);
                } else {
                    self.notify(user, "Please confirm the command [Y/N].");
                }
            }
            Phase::Generating(_) => {
                self.notify(
                    user,
                    "⨀ The agent is still working. Type stop to interrupt.",
                );
            }
            Phase::Idle => {
                session.add_message(Role::User, text);
                self.host.send_text(user, &format!("◇ {}", text));
                tracing::debug!(
                    target: "mineagent.chat.engine",
                    %user,
                    history = session.len(),
                    tokens = session.estimated_tokens(),
                    "user turn"
                );
                self.start_generation(user);
            }
        }
        true
    }

    /// Enter a session, or leave the current one
    pub fn handle_toggle(&mut self, user: UserId) {
        match self.slots.get(&user) {
            Some(UserSlot::Active { .. }) => self.exit_session(user),
            Some(UserSlot::PendingAgreement) => {
                self.slots.remove(&user);
                self.notify(user, "Agreement declined. You can enter again with /cli.");
            }
            None if self.agreements.contains(user) => self.enter_session(user),
            None => {
                tracing::info!(target: "mineagent.chat.engine", %user, "terms not yet accepted");
                self.slots.insert(user, UserSlot::PendingAgreement);
                self.send_terms(user);
            }
        }
    }

    /// Execute the staged command
    pub fn handle_confirm(&mut self, user: UserId) {
        let command = match self.slots.get_mut(&user) {
            Some(UserSlot::Active { phase, .. }) => match phase {
                Phase::Awaiting(PendingAction::Confirm(command)) => {
                    let command = std::mem::take(command);
                    *phase = Phase::Idle;
                    command
                }
                _ => return,
            },
            _ => return,
        };

        self.notify(user, "⇒ Command dispatched, waiting for output...");

        // Host execution may block until the command exits; keep it off the loop.
        let generation = self.begin_generating(user);
        let delay = Duration::from_millis(self.config.run_feedback_delay_ms);
        let runner = self.runner.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let blocking_command = command.clone();
            let outcome =
                tokio::task::spawn_blocking(move || runner.execute(user, &blocking_command)).await;
            let result = match outcome {
                Ok(run) => {
                    tokio::time::sleep(delay).await;
                    run.finish()
                }
                Err(e) => {
                    tracing::warn!(target: "mineagent.tools", %user, %command, error = %e, "command execution task failed");
                    infer_outcome(&command, false)
                }
            };
            let _ = events.send(EngineEvent::ToolFeedback {
                user,
                generation,
                text: format!("{}{}", RUN_RESULT, result),
            });
        });
    }

    /// Discard the staged action
    pub fn handle_cancel(&mut self, user: UserId) {
        if let Some(UserSlot::Active { phase, .. }) = self.slots.get_mut(&user) {
            if matches!(phase, Phase::Awaiting(_)) {
                *phase = Phase::Idle;
                self.notify(user, "⇒ Cancelled.");
            }
        }
    }

    /// Re-read session settings and/or the command and preset index.
    ///
    /// New settings apply to later turns and new sessions; the sweep
    /// interval keeps its value until restart. On error nothing changes.
    pub fn reload(&mut self, scope: ReloadScope) -> Result<ReloadReport> {
        if scope.includes_config() {
            let path = self.settings_path.as_deref().ok_or_else(|| {
                AgentError::Config("no settings file to reload from".to_string())
            })?;
            let settings = Settings::load_from(path)?;
            settings.validate()?;
            self.config = settings.session;
            tracing::info!(target: "mineagent.chat.engine", path = %path.display(), "session settings reloaded");
        }
        if scope.includes_workspace() {
            self.prompts.refresh();
        }
        Ok(ReloadReport {
            config_reloaded: scope.includes_config(),
            indexed_commands: self.prompts.command_count(),
            indexed_presets: self.prompts.preset_count(),
        })
    }

    /// Close every session idle for longer than the configured timeout
    pub fn sweep_idle_at(&mut self, now: DateTime<Utc>) {
        let timeout = chrono::Duration::minutes(self.config.timeout_minutes as i64);
        let expired: Vec<UserId> = self
            .slots
            .iter()
            .filter_map(|(user, slot)| match slot {
                UserSlot::Active { session, .. } if now - session.last_activity() > timeout => {
                    Some(*user)
                }
                _ => None,
            })
            .collect();

        for user in expired {
            tracing::info!(target: "mineagent.chat.engine", %user, "session timed out");
            self.notify(user, "Session closed after a period of inactivity.");
            self.exit_session(user);
        }
    }

    // -- Completions --

    pub fn apply_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::ChatFinished {
                user,
                generation,
                result,
            } => {
                if !self.is_current(user, generation) {
                    tracing::debug!(target: "mineagent.chat.engine", %user, generation, "discarding stale chat reply");
                    return;
                }
                match result {
                    Ok(reply) => self.handle_reply(user, reply),
                    Err(err) => self.handle_chat_failure(user, err),
                }
            }
            EngineEvent::ToolFeedback {
                user,
                generation,
                text,
            } => {
                if !self.is_current(user, generation) {
                    tracing::debug!(target: "mineagent.chat.engine", %user, generation, "discarding stale tool feedback");
                    return;
                }
                self.feedback(user, text);
            }
        }
    }

    fn is_current(&self, user: UserId, generation: u64) -> bool {
        matches!(
            self.slots.get(&user),
            Some(UserSlot::Active { phase: Phase::Generating(current), .. }) if *current == generation
        )
    }

    fn handle_reply(&mut self, user: UserId, reply: String) {
        let Some(UserSlot::Active { session, phase }) = self.slots.get_mut(&user) else {
            return;
        };
        tracing::info!(target: "mineagent.chat.engine", %user, len = reply.len(), "reply received");

        session.add_message(Role::Assistant, reply.as_str());
        let parsed = parse_reply(&reply);

        match parsed.directive {
            Some(directive) => {
                self.display_agent_text(user, &parsed.display);
                self.dispatch(user, directive);
            }
            None => {
                *phase = Phase::Idle;
                let estimated = session.estimated_tokens();
                self.display_agent_text(user, &parsed.display);
                self.check_token_budget(user, estimated);
            }
        }
    }

    fn handle_chat_failure(&mut self, user: UserId, err: AgentError) {
        let Some(UserSlot::Active { session, phase }) = self.slots.get_mut(&user) else {
            return;
        };
        *phase = Phase::Idle;
        session.remove_last_if(Role::User);

        if err.is_recoverable() {
            tracing::warn!(target: "mineagent.chat.engine", %user, error = %err, "chat call failed");
        } else {
            tracing::error!(target: "mineagent.chat.engine", %user, error = %err, "chat call misconfigured");
        }

        let notice = match &err {
            e if e.is_network() => format!(
                "Network error while contacting the AI ({}). Please send your message again.",
                e
            ),
            AgentError::Config(msg) => format!("The AI is not configured: {}", msg),
            e => format!("The AI call failed ({}). Please send your message again.", e),
        };
        self.notify(user, &notice);
    }

    fn dispatch(&mut self, user: UserId, directive: Directive) {
        tracing::info!(
            target: "mineagent.chat.engine",
            %user,
            tool = %directive.name,
            args = %directive.args,
            "executing tool"
        );

        let kind = directive.kind();
        if kind.map_or(true, |k| k.echoes_name()) {
            self.host.send_text(user, &format!("〇 {}", directive.name));
        }
        if kind.is_none() {
            self.notify(user, &format!("Unknown tool: {}", directive.name));
        }

        match self.dispatcher.plan(&directive) {
            ToolAction::Finish => self.set_phase(user, Phase::Idle),
            ToolAction::Exit => self.exit_session(user),
            ToolAction::Confirm(command) => {
                self.set_phase(user, Phase::Awaiting(PendingAction::Confirm(command.clone())));
                self.host.send_confirmation(user, &command);
            }
            ToolAction::Choose(options) => {
                self.host.send_choice(user, &options);
                self.set_phase(user, Phase::Awaiting(PendingAction::Choice(options)));
            }
            ToolAction::Feedback(text) => self.feedback(user, text),
            ToolAction::Deferred(work) => {
                if kind == Some(ToolKind::Search) {
                    self.host
                        .send_text(user, &format!("〇 #search: {}", directive.args));
                }
                let generation = self.begin_generating(user);
                let events = self.events_tx.clone();
                tokio::spawn(async move {
                    let text = work.await;
                    let _ = events.send(EngineEvent::ToolFeedback {
                        user,
                        generation,
                        text,
                    });
                });
            }
        }
    }

    // -- Transitions --

    fn send_terms(&self, user: UserId) {
        let lines = [
            "===============".to_string(),
            "MineAgent terms of use".to_string(),
            "1. Answers come from an AI and may be wrong.".to_string(),
            "2. Your messages are sent to Cloudflare for processing.".to_string(),
            "3. Do not share sensitive information.".to_string(),
            format!("Send {} to accept and continue.", self.config.acceptance_token),
            "===============".to_string(),
        ];
        for line in &lines {
            self.host.send_text(user, line);
        }
    }

    fn accept_terms(&mut self, user: UserId) {
        if let Err(e) = self.agreements.record(user) {
            tracing::warn!(target: "mineagent.chat.engine", %user, error = %e, "could not persist agreement");
        }
        tracing::info!(target: "mineagent.chat.engine", %user, "terms accepted");
        self.slots.remove(&user);
        self.enter_session(user);
    }

    fn enter_session(&mut self, user: UserId) {
        let session = ConversationSession::new(self.config.max_history, self.estimator());
        self.slots.insert(
            user,
            UserSlot::Active {
                session,
                phase: Phase::Idle,
            },
        );
        tracing::info!(target: "mineagent.chat.engine", %user, "session started");
        self.banner(user, "MineAgent ready. Type exit to leave.");
    }

    fn exit_session(&mut self, user: UserId) {
        if self.slots.remove(&user).is_some() {
            tracing::info!(target: "mineagent.chat.engine", %user, "session closed");
            self.banner(user, "MineAgent session closed.");
        }
    }

    fn interrupt(&mut self, user: UserId) {
        let Some(UserSlot::Active { phase, .. }) = self.slots.get_mut(&user) else {
            return;
        };
        let notice = match phase {
            Phase::Generating(_) => "⇒ Agent interrupted.",
            Phase::Awaiting(_) => "⇒ Pending action cancelled.",
            Phase::Idle => "Nothing is in progress. Type exit to leave.",
        };
        *phase = Phase::Idle;
        self.notify(user, notice);
    }

    /// Append a feedback turn and ask the agent again
    fn feedback(&mut self, user: UserId, text: String) {
        let Some(UserSlot::Active { session, .. }) = self.slots.get_mut(&user) else {
            return;
        };
        tracing::info!(target: "mineagent.chat.engine", %user, feedback = %text, "feedback turn");
        session.add_message(Role::User, text);
        self.start_generation(user);
    }

    /// Issue a chat call for the current history
    fn start_generation(&mut self, user: UserId) {
        let history = match self.slots.get(&user) {
            Some(UserSlot::Active { session, .. }) => session.history().to_vec(),
            _ => return,
        };
        let generation = self.begin_generating(user);
        let prompt = self.prompts.build(user);
        let backend = Arc::clone(&self.backend);
        let events = self.events_tx.clone();

        tokio::spawn(async move {
            let result = backend.chat(&history, &prompt).await;
            let _ = events.send(EngineEvent::ChatFinished {
                user,
                generation,
                result,
            });
        });
    }

    fn begin_generating(&mut self, user: UserId) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.set_phase(user, Phase::Generating(generation));
        generation
    }

    fn set_phase(&mut self, user: UserId, next: Phase) {
        if let Some(UserSlot::Active { phase, .. }) = self.slots.get_mut(&user) {
            *phase = next;
        }
    }

    // -- Output --

    fn notify(&self, user: UserId, text: &str) {
        self.host.send_text(user, text);
    }

    fn banner(&self, user: UserId, text: &str) {
        self.host.send_text(user, "==================");
        self.host.send_text(user, text);
        self.host.send_text(user, "==================");
    }

    fn display_agent_text(&self, user: UserId, display: &str) {
        for line in display.lines().map(str::trim).filter(|l| !l.is_empty()) {
            self.host.send_text(user, &format!("◆ {}", line));
        }
    }

    fn check_token_budget(&self, user: UserId, estimated: u32) {
        let remaining = self.config.token_ceiling as i64 - estimated as i64;
        if remaining < self.config.token_warning_threshold as i64 {
            self.notify(
                user,
                &format!(
                    "⨀ Token budget low ({} left). The agent may forget earlier parts of the conversation.",
                    remaining
                ),
            );
        }
    }
}

fn is_keyword(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.eq_ignore_ascii_case(k))
}

/// Build an engine, start its loop on the runtime and return the handle
pub fn spawn_engine(
    config: SessionConfig,
    backend: Arc<dyn ChatBackend>,
    host: Arc<dyn HostRuntime>,
    dispatcher: ToolDispatcher,
    agreements: AgreementStore,
) -> (EngineHandle, JoinHandle<()>) {
    let (engine, handle) = SessionEngine::new(config, backend, host, dispatcher, agreements);
    let task = tokio::spawn(engine.run());
    (handle, task)
}
