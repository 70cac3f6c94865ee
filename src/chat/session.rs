// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation session
//!
//! Per-user bounded history plus the activity clock the idle sweep reads.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::llm::message::{Message, Role};

/// Default history cap (entries, not pairs)
pub const DEFAULT_MAX_HISTORY: usize = 20;

/// Turns a history into an approximate token count
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, history: &[Message]) -> u32;
}

/// Estimates tokens as total characters divided by a fixed ratio
#[derive(Debug, Clone, Copy)]
pub struct CharRatioEstimator {
    chars_per_token: u32,
}

impl CharRatioEstimator {
    pub fn new(chars_per_token: u32) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self::new(4)
    }
}

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, history: &[Message]) -> u32 {
        let chars: usize = history.iter().map(Message::char_len).sum();
        (chars / self.chars_per_token as usize) as u32
    }
}

/// One user's conversation with the agent
pub struct ConversationSession {
    history: Vec<Message>,
    last_activity: DateTime<Utc>,
    max_history: usize,
    estimator: Arc<dyn TokenEstimator>,
}

impl ConversationSession {
    /// Create an empty session. `max_history` is rounded up to an even
    /// number so eviction always removes whole user/assistant pairs.
    pub fn new(max_history: usize, estimator: Arc<dyn TokenEstimator>) -> Self {
        let max_history = max_history.max(2);
        Self {
            history: Vec::new(),
            last_activity: Utc::now(),
            max_history: max_history + max_history % 2,
            estimator,
        }
    }

    /// Append a message, refresh the activity clock and enforce the cap
    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        self.add_message_at(role, content, Utc::now());
    }

    /// Same as `add_message` with an explicit timestamp
    pub fn add_message_at(&mut self, role: Role, content: impl Into<String>, now: DateTime<Utc>) {
        self.history.push(Message {
            role,
            content: content.into(),
        });
        self.last_activity = now;

        while self.history.len() > self.max_history {
            let evict = self.history.len().min(2);
            self.history.drain(..evict);
        }
    }

    /// Drop the newest message, returning it
    pub fn remove_last_message(&mut self) -> Option<Message> {
        self.history.pop()
    }

    /// Drop the newest message only if it has the given role
    pub fn remove_last_if(&mut self, role: Role) -> Option<Message> {
        if self.history.last().map(|m| m.role) == Some(role) {
            self.history.pop()
        } else {
            None
        }
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Approximate tokens used by the whole history
    pub fn estimated_tokens(&self) -> u32 {
        self.estimator.estimate(&self.history)
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY, Arc::new(CharRatioEstimator::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_add_message_appends_in_order() {
        let mut session = ConversationSession::default();
        session.add_message(Role::User, "hello");
        session.add_message(Role::Assistant, "hi");

        assert_eq!(session.len(), 2);
        assert_eq!(session.history()[0].content, "hello");
        assert_eq!(session.history()[1].role, Role::Assistant);
    }

    #[test]
    fn test_cap_evicts_oldest_pair() {
        let mut session = ConversationSession::default();
        for i in 0..20 {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            session.add_message(role, format!("m{}", i));
        }
        assert_eq!(session.len(), 20);

        session.add_message(Role::User, "m20");
        assert_eq!(session.len(), 19);
        assert_eq!(session.history()[0].content, "m2");
        assert_eq!(session.history()[0].role, Role::User);
    }

    #[test]
    fn test_odd_cap_rounds_up() {
        let session = ConversationSession::new(7, Arc::new(CharRatioEstimator::default()));
        assert_eq!(session.max_history(), 8);
    }

    #[test]
    fn test_remove_last_message() {
        let mut session = ConversationSession::default();
        session.add_message(Role::User, "a");
        session.add_message(Role::User, "b");

        let removed = session.remove_last_message().unwrap();
        assert_eq!(removed.content, "b");
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn test_remove_last_if_checks_role() {
        let mut session = ConversationSession::default();
        session.add_message(Role::User, "q");
        session.add_message(Role::Assistant, "a");

        assert!(session.remove_last_if(Role::User).is_none());
        assert_eq!(session.len(), 2);
        assert!(session.remove_last_if(Role::Assistant).is_some());
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn test_remove_from_empty() {
        let mut session = ConversationSession::default();
        assert!(session.remove_last_message().is_none());
    }

    #[test]
    fn test_estimated_tokens_chars_over_four() {
        let mut session = ConversationSession::default();
        session.add_message(Role::User, "x".repeat(15_200));
        assert_eq!(session.estimated_tokens(), 3800);
    }

    #[test]
    fn test_custom_ratio() {
        let mut session = ConversationSession::new(20, Arc::new(CharRatioEstimator::new(2)));
        session.add_message(Role::User, "abcdef");
        assert_eq!(session.estimated_tokens(), 3);
    }

    #[test]
    fn test_last_activity_tracks_adds() {
        let mut session = ConversationSession::default();
        let later = Utc::now() + Duration::minutes(5);
        session.add_message_at(Role::User, "hi", later);
        assert_eq!(session.last_activity(), later);
    }
}
