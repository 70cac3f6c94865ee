// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Cloudflare Workers AI chat backend
//!
//! Implements the ChatBackend trait against the Workers AI `ai/run` endpoint.
//! Two payload families are supported: the Responses-style shape used by the
//! `gpt-oss` models and the classic `messages` chat shape used by the rest.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::config::Settings;
use crate::error::{AgentError, ApiError, Result};
use crate::llm::message::{Message, Role};
use crate::llm::provider::ChatBackend;

const CLOUDFLARE_API_URL: &str = "https://api.cloudflare.com/client/v4";
const DEFAULT_MODEL: &str = "@cf/openai/gpt-oss-120b";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Cloudflare Workers AI client
pub struct CloudflareClient {
    /// Pooled transport; `None` once shut down
    client: Mutex<Option<Client>>,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    /// Resolved once per process
    account_id: OnceCell<String>,
}

impl CloudflareClient {
    /// Create a client with the default endpoint, model and timeouts
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, CLOUDFLARE_API_URL)
    }

    /// Create with a custom base URL
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        Self::build(
            api_key.into(),
            base_url.into(),
            DEFAULT_CONNECT_TIMEOUT,
            DEFAULT_REQUEST_TIMEOUT,
        )
    }

    /// Create from settings. A missing token is a configuration error.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let config = &settings.cloudflare;
        let api_key = settings.get_cloudflare_api_key().ok_or_else(|| {
            AgentError::Config(format!(
                "no Cloudflare API token; set {} or cloudflare.api_key in {}",
                config.api_key_env,
                Settings::default_path().display()
            ))
        })?;

        let mut client = Self::build(
            api_key,
            config.base_url.clone(),
            Duration::from_secs(config.connect_timeout_secs),
            Duration::from_secs(config.request_timeout_secs),
        )?
        .with_model(config.model.clone())
        .with_max_tokens(config.max_tokens);

        if let Some(account_id) = config.account_id.as_deref().filter(|id| !id.is_empty()) {
            client = client.with_account_id(account_id);
        }
        Ok(client)
    }

    fn build(
        api_key: String,
        base_url: String,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            client: Mutex::new(Some(client)),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 1024,
            account_id: OnceCell::new(),
        })
    }

    /// Set the model to run
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the max_tokens sent to chat-family models
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Use a known account id instead of resolving it
    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = OnceCell::new_with(Some(account_id.into()));
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Transport shared with auxiliary calls such as search.
    /// After shutdown a fresh, unpooled client is handed out.
    pub fn http_client(&self) -> Client {
        self.pooled().unwrap_or_default()
    }

    fn pooled(&self) -> Option<Client> {
        match self.client.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// True for models that take the Responses-style payload
    fn is_responses_family(&self) -> bool {
        self.model.contains("gpt-oss")
    }

    fn run_url(&self, account_id: &str) -> String {
        format!("{}/accounts/{}/ai/run/{}", self.base_url, account_id, self.model)
    }

    async fn resolve_account_id(&self, client: &Client) -> Result<String> {
        let id = self
            .account_id
            .get_or_try_init(|| self.fetch_account_id(client))
            .await?;
        Ok(id.clone())
    }

    async fn fetch_account_id(&self, client: &Client) -> Result<String> {
        let url = format!("{}/accounts", self.base_url);
        tracing::info!(target: "mineagent.llm", %url, "resolving Cloudflare account id");

        let config_error = |detail: String| {
            AgentError::Config(format!(
                "could not resolve the Cloudflare account id ({}); check the API token or set cloudflare.account_id",
                detail
            ))
        };

        let response = client
            .get(&url)
            .header("Authorization", format!("Bearer {}", &self.api_key))
            .send()
            .await
            .map_err(|e| config_error(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        if !(200..300).contains(&status) {
            tracing::warn!(target: "mineagent.llm", status, %body, "account lookup failed");
            return Err(config_error(format!("status {}", status)));
        }

        let accounts: AccountsResponse =
            serde_json::from_str(&body).map_err(|e| config_error(e.to_string()))?;
        accounts
            .result
            .into_iter()
            .next()
            .map(|account| account.id)
            .ok_or_else(|| config_error("no accounts visible to this token".to_string()))
    }

    /// Build the request body for the configured model family
    fn build_request(&self, history: &[Message], system_prompt: &str) -> RunRequest {
        let turns = history
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| WireMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            });

        if self.is_responses_family() {
            RunRequest::Responses {
                model: self.model.clone(),
                instructions: system_prompt.to_string(),
                input: turns.collect(),
            }
        } else {
            let mut messages = vec![WireMessage {
                role: Role::System.as_str().to_string(),
                content: system_prompt.to_string(),
            }];
            messages.extend(turns);
            RunRequest::Chat {
                messages,
                max_tokens: self.max_tokens,
            }
        }
    }
}

/// Extract the assistant text from a response body.
///
/// Shapes are tried in a fixed order after unwrapping a `result` envelope:
/// a bare string, `response`, `choices[0].message.content`, then the
/// structured `output[]` message list.
pub fn extract_reply(body: &Value) -> Option<String> {
    let value = body.get("result").unwrap_or(body);

    if let Some(text) = value.as_str() {
        return Some(text.to_string());
    }
    if let Some(text) = value.get("response").and_then(Value::as_str) {
        return Some(text.to_string());
    }
    if let Some(text) = value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
    {
        return Some(text.to_string());
    }

    let texts: Vec<&str> = value
        .get("output")?
        .as_array()?
        .iter()
        .filter(|item| item.get("type").and_then(Value::as_str) == Some("message"))
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|part| part.get("type").and_then(Value::as_str) == Some("output_text"))
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();

    if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n"))
    }
}

#[async_trait]
impl ChatBackend for CloudflareClient {
    fn name(&self) -> &str {
        "cloudflare"
    }

    async fn chat(&self, history: &[Message], system_prompt: &str) -> Result<String> {
        let client = self.pooled().ok_or_else(|| {
            AgentError::Config("the Cloudflare client has been shut down".to_string())
        })?;
        let account_id = self.resolve_account_id(&client).await?;
        let url = self.run_url(&account_id);
        let body = self.build_request(history, system_prompt);

        tracing::info!(target: "mineagent.llm", %url, model = %self.model, turns = history.len(), "chat request");
        if let Ok(payload) = serde_json::to_string(&body) {
            tracing::debug!(target: "mineagent.llm", %payload, "chat payload");
        }

        let response = client
            .post(&url)
            .header("Authorization", format!("Bearer {}", &self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;

        if !(200..300).contains(&status) {
            tracing::warn!(target: "mineagent.llm", status, body = %text, "chat request failed");
            return Err(AgentError::Api(ApiError::Status { status, body: text }));
        }
        tracing::debug!(target: "mineagent.llm", status, body = %text, "chat response");

        let value: Value = serde_json::from_str(&text)
            .map_err(|_| AgentError::Api(ApiError::Unparseable(text.clone())))?;
        extract_reply(&value).ok_or_else(|| {
            tracing::warn!(target: "mineagent.llm", body = %text, "unparseable chat response");
            AgentError::Api(ApiError::Unparseable(text))
        })
    }

    fn shutdown(&self) {
        let released = match self.client.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if released.is_some() {
            tracing::info!(target: "mineagent.llm", "cloudflare client shut down");
        }
    }
}

// Cloudflare API types

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RunRequest {
    Responses {
        model: String,
        instructions: String,
        input: Vec<WireMessage>,
    },
    Chat {
        messages: Vec<WireMessage>,
        max_tokens: u32,
    },
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    #[serde(default)]
    result: Vec<Account>,
}

#[derive(Debug, Deserialize)]
struct Account {
    id: String,
}
