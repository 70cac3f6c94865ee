// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat backend trait
//!
//! The seam between the session engine and a remote LLM API.

use async_trait::async_trait;

use crate::error::Result;
use crate::llm::message::Message;

/// Main trait for remote chat backends
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Get the backend name (e.g., "cloudflare")
    fn name(&self) -> &str;

    /// Send the ordered history plus a system prompt and return the
    /// assistant's reply text.
    ///
    /// System-role entries in `history` are never forwarded; the system
    /// prompt travels on its own channel.
    async fn chat(&self, history: &[Message], system_prompt: &str) -> Result<String>;

    /// Release pooled connections. Later calls to `chat` fail.
    fn shutdown(&self) {}
}
