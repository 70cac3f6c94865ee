// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for MineAgent
//!
//! Handles loading and saving settings from ~/.mineagent/settings.json

use serde::{Deserialize, Serialize};

mod io;
mod migration;
mod validation;

/// Main settings structure, stored in ~/.mineagent/settings.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Crate version that last wrote this file
    #[serde(default = "default_version")]
    pub version: String,

    /// Cloudflare Workers AI configuration
    #[serde(default)]
    pub cloudflare: CloudflareConfig,

    /// Session lifecycle and token budget settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Wiki and web search settings
    #[serde(default)]
    pub search: SearchConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            cloudflare: CloudflareConfig::default(),
            session: SessionConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

/// Cloudflare Workers AI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudflareConfig {
    /// API token (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for the API token
    #[serde(default = "default_cloudflare_api_key_env")]
    pub api_key_env: String,

    /// Account id; resolved from the API when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,

    /// Model to run
    #[serde(default = "default_cloudflare_model")]
    pub model: String,

    /// Base URL for the v4 API
    #[serde(default = "default_cloudflare_base_url")]
    pub base_url: String,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Whole-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Maximum tokens requested from chat-family models
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for CloudflareConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_cloudflare_api_key_env(),
            account_id: None,
            model: default_cloudflare_model(),
            base_url: default_cloudflare_base_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Session lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle minutes before a session is closed
    #[serde(default = "default_timeout_minutes")]
    pub timeout_minutes: u64,

    /// Warn when the remaining token budget drops below this
    #[serde(default = "default_token_warning_threshold")]
    pub token_warning_threshold: u32,

    /// Token budget the estimate is measured against
    #[serde(default = "default_token_ceiling")]
    pub token_ceiling: u32,

    /// Maximum history entries kept per session (must be even)
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Estimated characters per token
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: u32,

    /// Seconds between idle sweeps
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Exact text a user sends to accept the terms
    #[serde(default = "default_acceptance_token")]
    pub acceptance_token: String,

    /// Delay before captured command output is fed back
    #[serde(default = "default_run_feedback_delay_ms")]
    pub run_feedback_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: default_timeout_minutes(),
            token_warning_threshold: default_token_warning_threshold(),
            token_ceiling: default_token_ceiling(),
            max_history: default_max_history(),
            chars_per_token: default_chars_per_token(),
            sweep_interval_secs: default_sweep_interval_secs(),
            acceptance_token: default_acceptance_token(),
            run_feedback_delay_ms: default_run_feedback_delay_ms(),
        }
    }
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// MediaWiki api.php endpoint
    #[serde(default = "default_wiki_api_url")]
    pub wiki_api_url: String,

    /// DuckDuckGo instant answer endpoint
    #[serde(default = "default_web_api_url")]
    pub web_api_url: String,

    /// Hits included in a summary
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Query prefix that forces a web search
    #[serde(default = "default_broad_marker")]
    pub broad_marker: String,

    /// User-Agent sent with search requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            wiki_api_url: default_wiki_api_url(),
            web_api_url: default_web_api_url(),
            max_results: default_max_results(),
            broad_marker: default_broad_marker(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_cloudflare_api_key_env() -> String {
    "CLOUDFLARE_API_TOKEN".to_string()
}

fn default_cloudflare_model() -> String {
    "@cf/openai/gpt-oss-120b".to_string()
}

fn default_cloudflare_base_url() -> String {
    "https://api.cloudflare.com/client/v4".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_timeout_minutes() -> u64 {
    10
}

fn default_token_warning_threshold() -> u32 {
    500
}

fn default_token_ceiling() -> u32 {
    4000
}

fn default_max_history() -> usize {
    20
}

fn default_chars_per_token() -> u32 {
    4
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_acceptance_token() -> String {
    "agree".to_string()
}

fn default_run_feedback_delay_ms() -> u64 {
    1000
}

fn default_wiki_api_url() -> String {
    "https://minecraft.wiki/api.php".to_string()
}

fn default_web_api_url() -> String {
    "https://api.duckduckgo.com/".to_string()
}

fn default_max_results() -> usize {
    3
}

fn default_broad_marker() -> String {
    "widely".to_string()
}

fn default_user_agent() -> String {
    format!("MineAgent/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert_eq!(settings.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(settings.session.max_history, 20);
        assert_eq!(settings.session.token_ceiling, 4000);
        assert_eq!(settings.session.token_warning_threshold, 500);
    }

    #[test]
    fn test_cloudflare_config_default() {
        let config = CloudflareConfig::default();
        assert!(config.api_key.is_none());
        assert!(config.account_id.is_none());
        assert_eq!(config.api_key_env, "CLOUDFLARE_API_TOKEN");
        assert!(config.model.contains("gpt-oss"));
        assert_eq!(config.connect_timeout_secs, 30);
        assert_eq!(config.request_timeout_secs, 60);
    }

    #[test]
    fn test_search_config_default() {
        let config = SearchConfig::default();
        assert_eq!(config.max_results, 3);
        assert_eq!(config.broad_marker, "widely");
        assert!(config.user_agent.starts_with("MineAgent/"));
    }

    #[test]
    fn test_settings_partial_json() {
        let json = r#"{"session": {"timeout_minutes": 3}}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.session.timeout_minutes, 3);
        assert_eq!(settings.session.acceptance_token, "agree");
        assert_eq!(settings.cloudflare.base_url, default_cloudflare_base_url());
    }

    #[test]
    fn test_settings_load_from_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nonexistent.json");

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.session.max_history, 20);
    }

    #[test]
    fn test_settings_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");

        let mut settings = Settings::default();
        settings.session.timeout_minutes = 25;
        settings.cloudflare.model = "@cf/meta/llama-3.1-8b-instruct".to_string();
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.session.timeout_minutes, 25);
        assert_eq!(loaded.cloudflare.model, "@cf/meta/llama-3.1-8b-instruct");
    }

    #[test]
    fn test_settings_save_preserves_unknown_keys() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(
            &path,
            format!(
                r#"{{"version": "{}", "operator_note": "keep me"}}"#,
                env!("CARGO_PKG_VERSION")
            ),
        )
        .unwrap();

        Settings::default().save_to(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["operator_note"], "keep me");
    }

    #[test]
    fn test_directories_follow_home() {
        let home = std::path::PathBuf::from("/srv/agent");
        assert_eq!(
            Settings::preset_dir_in(&home),
            std::path::PathBuf::from("/srv/agent/preset")
        );
        assert_eq!(
            Settings::agreement_path_in(&home),
            std::path::PathBuf::from("/srv/agent/agreed_users.txt")
        );
    }
}
