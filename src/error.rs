// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for MineAgent
//!
//! Every failure the agent core can produce is one of these. Nothing here is
//! allowed to escape to the host runtime: the session engine converts each
//! variant into a user notice or a feedback turn.

use thiserror::Error;

/// Main error type for MineAgent operations
#[derive(Error, Debug)]
pub enum AgentError {
    /// Remote chat API errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Configuration errors (missing credential, unresolvable account)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A tool directive carried unusable arguments
    #[error("Invalid tool arguments: {0}")]
    ToolArgument(String),

    /// Session errors
    #[error("Session error: {0}")]
    Session(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Remote-call error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Connection could not be established or was dropped
    #[error("Network error: {0}")]
    Network(String),

    /// Timeout waiting for response
    #[error("Request timed out")]
    Timeout,

    /// API answered with a non-success status
    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    /// Body did not match any known response shape
    #[error("Unparseable response: {0}")]
    Unparseable(String),
}

impl AgentError {
    /// Network and protocol failures are recovered locally by rolling back
    /// the failed turn. Configuration failures need the operator to act.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AgentError::Api(_))
    }

    /// True for transport-level failures (connect, timeout).
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            AgentError::Api(ApiError::Network(_)) | AgentError::Api(ApiError::Timeout)
        )
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        AgentError::Api(err.into())
    }
}

/// Result type alias for MineAgent operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = AgentError::Config("set cloudflare.api_key".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("cloudflare.api_key"));
    }

    #[test]
    fn test_tool_argument_error_display() {
        let err = AgentError::ToolArgument("#run needs a command".to_string());
        assert!(err.to_string().contains("Invalid tool arguments"));
    }

    #[test]
    fn test_status_error_carries_body() {
        let err = ApiError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert!(err.to_string().contains("502"));
        assert!(err.to_string().contains("bad gateway"));
    }

    #[test]
    fn test_timeout_display() {
        assert!(ApiError::Timeout.to_string().contains("timed out"));
    }

    #[test]
    fn test_recoverable_classification() {
        let network: AgentError = ApiError::Network("refused".to_string()).into();
        let protocol: AgentError = ApiError::Unparseable("{}".to_string()).into();
        let config = AgentError::Config("missing key".to_string());

        assert!(network.is_recoverable());
        assert!(network.is_network());
        assert!(protocol.is_recoverable());
        assert!(!protocol.is_network());
        assert!(!config.is_recoverable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: AgentError = io_err.into();
        assert!(matches!(err, AgentError::Io(_)));
    }
}
