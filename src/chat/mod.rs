// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat module for MineAgent
//!
//! Conversation state, reply parsing and the session engine.

pub mod agreement;
pub mod directive;
pub mod engine;
pub mod handle;
pub mod prompt;
pub mod session;

pub use agreement::AgreementStore;
pub use directive::{parse_reply, Directive, ParsedReply};
pub use engine::{spawn_engine, EngineEvent, PendingAction, SessionEngine, SessionMode};
pub use handle::{EngineHandle, EngineStatus, ReloadReport, ReloadScope};
pub use prompt::PromptBuilder;
pub use session::{CharRatioEstimator, ConversationSession, TokenEstimator};
