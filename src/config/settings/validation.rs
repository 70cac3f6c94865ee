// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::error::{AgentError, Result};

use super::Settings;

impl Settings {
    /// Get the Cloudflare API token, checking env var first.
    /// Empty values count as missing.
    pub fn get_cloudflare_api_key(&self) -> Option<String> {
        // Priority: env var > config file.
        std::env::var(&self.cloudflare.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| {
                self.cloudflare
                    .api_key
                    .clone()
                    .filter(|key| !key.trim().is_empty())
            })
    }

    /// Check the settings for values the session engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        let session = &self.session;
        if session.timeout_minutes == 0 {
            return Err(AgentError::Config(
                "session.timeout_minutes must be at least 1".to_string(),
            ));
        }
        if session.max_history == 0 || session.max_history % 2 != 0 {
            return Err(AgentError::Config(
                "session.max_history must be a positive even number".to_string(),
            ));
        }
        if session.chars_per_token == 0 {
            return Err(AgentError::Config(
                "session.chars_per_token must be at least 1".to_string(),
            ));
        }
        if session.token_warning_threshold >= session.token_ceiling {
            return Err(AgentError::Config(
                "session.token_warning_threshold must be below session.token_ceiling".to_string(),
            ));
        }
        if self.search.max_results == 0 {
            return Err(AgentError::Config(
                "search.max_results must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_odd_history_rejected() {
        let mut settings = Settings::default();
        settings.session.max_history = 7;
        assert!(matches!(settings.validate(), Err(AgentError::Config(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut settings = Settings::default();
        settings.session.timeout_minutes = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_threshold_above_ceiling_rejected() {
        let mut settings = Settings::default();
        settings.session.token_warning_threshold = 4000;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_api_key_from_file() {
        let mut settings = Settings::default();
        settings.cloudflare.api_key_env = "MINEAGENT_TEST_KEY_FILE_ONLY".to_string();
        settings.cloudflare.api_key = Some("from-file".to_string());
        assert_eq!(settings.get_cloudflare_api_key().as_deref(), Some("from-file"));
    }

    #[test]
    fn test_api_key_env_takes_priority() {
        let mut settings = Settings::default();
        settings.cloudflare.api_key_env = "MINEAGENT_TEST_KEY_ENV_PRIORITY".to_string();
        settings.cloudflare.api_key = Some("from-file".to_string());
        std::env::set_var("MINEAGENT_TEST_KEY_ENV_PRIORITY", "from-env");
        assert_eq!(settings.get_cloudflare_api_key().as_deref(), Some("from-env"));
        std::env::remove_var("MINEAGENT_TEST_KEY_ENV_PRIORITY");
    }

    #[test]
    fn test_empty_api_key_is_missing() {
        let mut settings = Settings::default();
        settings.cloudflare.api_key_env = "MINEAGENT_TEST_KEY_EMPTY".to_string();
        settings.cloudflare.api_key = Some("   ".to_string());
        assert!(settings.get_cloudflare_api_key().is_none());
    }
}
