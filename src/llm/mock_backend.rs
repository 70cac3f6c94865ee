// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Mock chat backend for testing
//!
//! Returns scripted replies or failures and records every request, so
//! engine tests can run without a network.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{AgentError, ApiError, Result};
use crate::llm::message::Message;
use crate::llm::provider::ChatBackend;

/// A scripted outcome for one chat call
#[derive(Clone, Debug)]
pub enum MockReply {
    /// Successful reply text
    Text(String),
    /// Connection failure
    Network(String),
    /// Request timed out
    Timeout,
    /// Non-success status with body
    Status(u16, String),
    /// Missing credential or similar
    Config(String),
}

impl MockReply {
    fn into_result(self) -> Result<String> {
        match self {
            MockReply::Text(text) => Ok(text),
            MockReply::Network(msg) => Err(ApiError::Network(msg).into()),
            MockReply::Timeout => Err(ApiError::Timeout.into()),
            MockReply::Status(status, body) => Err(ApiError::Status { status, body }.into()),
            MockReply::Config(msg) => Err(AgentError::Config(msg)),
        }
    }
}

/// One recorded call
#[derive(Clone, Debug)]
pub struct RecordedChat {
    pub history: Vec<Message>,
    pub system_prompt: String,
}

/// A mock chat backend for testing
#[derive(Clone)]
pub struct MockBackend {
    /// Configured replies, consumed in order; the last one repeats
    replies: Arc<Mutex<Vec<MockReply>>>,
    /// Call counter
    call_count: Arc<AtomicUsize>,
    /// Recorded requests
    recorded: Arc<Mutex<Vec<RecordedChat>>>,
    /// Artificial latency per call
    delay: Option<Duration>,
    shut_down: Arc<AtomicBool>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Mock backend lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl MockBackend {
    /// Create a mock backend that finishes every turn
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(vec![MockReply::Text("Done. #over".to_string())])),
            call_count: Arc::new(AtomicUsize::new(0)),
            recorded: Arc::new(Mutex::new(vec![])),
            delay: None,
            shut_down: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Reply with a single text for every call
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.with_script(vec![MockReply::Text(text.into())])
    }

    /// Queue multiple text replies (returned in order)
    pub fn with_replies(self, texts: Vec<String>) -> Self {
        self.with_script(texts.into_iter().map(MockReply::Text).collect())
    }

    /// Queue a mixed script of replies and failures
    pub fn with_script(self, script: Vec<MockReply>) -> Self {
        {
            let mut replies = lock(&self.replies);
            replies.clear();
            replies.extend(script);
        }
        self
    }

    /// Sleep before answering each call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get the number of calls made
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Get all recorded requests
    pub fn recorded(&self) -> Vec<RecordedChat> {
        lock(&self.recorded).clone()
    }

    /// Get the last request made
    pub fn last_request(&self) -> Option<RecordedChat> {
        lock(&self.recorded).last().cloned()
    }

    /// Whether `shutdown` was called
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> MockReply {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst);
        let replies = lock(&self.replies);
        if replies.is_empty() {
            MockReply::Text("#over".to_string())
        } else {
            replies[count.min(replies.len() - 1)].clone()
        }
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn chat(&self, history: &[Message], system_prompt: &str) -> Result<String> {
        lock(&self.recorded).push(RecordedChat {
            history: history.to_vec(),
            system_prompt: system_prompt.to_string(),
        });

        let reply = self.next_reply();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        reply.into_result()
    }

    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}
