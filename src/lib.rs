// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! MineAgent - in-game conversational agent for game servers.
//!
//! A player talks to the agent in chat; the agent answers through a remote
//! LLM and may end a reply with one tool directive (`#run`, `#get`,
//! `#choose`, `#search`, `#over`, `#exit`). Tool results are fed back into
//! the conversation until the agent finishes.
//!
//! Architecture highlights:
//! - `chat`: conversation session, directive parser, session engine actor
//! - `llm`: chat backend seam and the Cloudflare Workers AI client
//! - `tools`: directive dispatch, command capture, presets and search
//! - `host`: the boundary to the game server and a console stand-in
//! - `config`: settings persistence, migration and validation

pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod llm;
pub mod tools;

pub use error::{AgentError, Result};
