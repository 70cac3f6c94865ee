// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Wiki and web search for `#search`
//!
//! Queries the game wiki through the MediaWiki search API and falls back to
//! the DuckDuckGo instant-answer API. Results are flattened into one short
//! summary for the agent; failures become part of that summary.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::SearchConfig;
use crate::error::{ApiError, Result};

/// Something that can turn a query into a summary for the agent
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str) -> String;
}

/// HTTP search client sharing the chat client's connection pool
pub struct SearchClient {
    client: Client,
    config: SearchConfig,
}

impl SearchClient {
    pub fn new(client: Client, config: SearchConfig) -> Self {
        Self { client, config }
    }

    /// If the query opens with the broad marker as a whole word, return the
    /// rest of it. A bare marker with nothing after it is an ordinary query.
    fn strip_broad_marker(&self, query: &str) -> Option<String> {
        let marker = self.config.broad_marker.as_str();
        let query = query.trim();
        if marker.is_empty() {
            return None;
        }
        let head = query.get(..marker.len())?;
        if !head.eq_ignore_ascii_case(marker) {
            return None;
        }
        let rest = &query[marker.len()..];
        if !rest.starts_with(|c: char| c.is_whitespace() || c == ':') {
            return None;
        }
        let rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ':').trim();
        (!rest.is_empty()).then(|| rest.to_string())
    }

    /// Search the wiki; returns `title: snippet` lines for the top hits
    pub async fn wiki_search(&self, query: &str) -> Result<Vec<String>> {
        tracing::info!(target: "mineagent.search", url = %self.config.wiki_api_url, %query, "wiki search");

        let response = self
            .client
            .get(&self.config.wiki_api_url)
            .header("User-Agent", &self.config.user_agent)
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("format", "json"),
                ("utf8", "1"),
            ])
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        if !(200..300).contains(&status) {
            tracing::warn!(target: "mineagent.search", status, %body, "wiki search failed");
            return Err(ApiError::Status { status, body }.into());
        }

        let parsed: WikiResponse = serde_json::from_str(&body)
            .map_err(|_| ApiError::Unparseable(body.clone()))?;
        let hits = parsed.query.map(|q| q.search).unwrap_or_default();

        Ok(hits
            .into_iter()
            .take(self.config.max_results)
            .map(|hit| {
                format!(
                    "{}: {}",
                    hit.title,
                    decode_html_entities(&strip_tags(&hit.snippet))
                )
            })
            .collect())
    }

    /// Search the web; returns the abstract or up to `max_results` topics
    pub async fn web_search(&self, query: &str) -> Result<Option<String>> {
        tracing::info!(target: "mineagent.search", url = %self.config.web_api_url, %query, "web search");

        let response = self
            .client
            .get(&self.config.web_api_url)
            .header("User-Agent", &self.config.user_agent)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        if !(200..300).contains(&status) {
            tracing::warn!(target: "mineagent.search", status, %body, "web search failed");
            return Err(ApiError::Status { status, body }.into());
        }

        let answer: InstantAnswer = serde_json::from_str(&body)
            .map_err(|_| ApiError::Unparseable(body.clone()))?;

        if !answer.abstract_text.trim().is_empty() {
            return Ok(Some(format!(
                "Web summary ({}): {}",
                query,
                answer.abstract_text.trim()
            )));
        }

        let mut texts = Vec::new();
        collect_topics(&answer.related_topics, self.config.max_results, &mut texts);
        if texts.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!("Related results:\n{}", bullet_list(&texts))))
    }

    async fn web_summary(&self, query: &str) -> String {
        match self.web_search(query).await {
            Ok(Some(summary)) => summary,
            Ok(None) => "No web results found.".to_string(),
            Err(e) => format!("web search failed: {}", e),
        }
    }
}

#[async_trait]
impl SearchBackend for SearchClient {
    async fn search(&self, query: &str) -> String {
        if let Some(rest) = self.strip_broad_marker(query) {
            return self.web_summary(&rest).await;
        }

        match self.wiki_search(query).await {
            Ok(hits) if !hits.is_empty() => {
                format!("Minecraft Wiki results:\n{}", bullet_list(&hits))
            }
            Ok(_) => {
                tracing::debug!(target: "mineagent.search", %query, "no wiki hits, trying web");
                self.web_summary(query).await
            }
            Err(e) => {
                tracing::warn!(target: "mineagent.search", %query, error = %e, "wiki search error, trying web");
                self.web_summary(query).await
            }
        }
    }
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Depth-first walk of related topics, nested groups included
fn collect_topics(topics: &[RelatedTopic], max: usize, out: &mut Vec<String>) {
    for topic in topics {
        if out.len() >= max {
            return;
        }
        if let Some(nested) = &topic.topics {
            collect_topics(nested, max, out);
        } else if let Some(text) = topic.text.as_deref().filter(|t| !t.trim().is_empty()) {
            out.push(text.trim().to_string());
        }
    }
}

/// Strip HTML tags from a string.
pub fn strip_tags(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut in_tag = false;
    for ch in s.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.trim().to_string()
}

/// Decode the handful of entities MediaWiki snippets use.
pub fn decode_html_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&amp;", "&")
}

// Search API types

#[derive(Debug, Deserialize)]
struct WikiResponse {
    query: Option<WikiQuery>,
}

#[derive(Debug, Deserialize)]
struct WikiQuery {
    #[serde(default)]
    search: Vec<WikiHit>,
}

#[derive(Debug, Deserialize)]
struct WikiHit {
    title: String,
    #[serde(default)]
    snippet: String,
}

#[derive(Debug, Deserialize)]
struct InstantAnswer {
    #[serde(rename = "AbstractText", default)]
    abstract_text: String,
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Deserialize)]
struct RelatedTopic {
    #[serde(rename = "Text")]
    text: Option<String>,
    #[serde(rename = "Topics")]
    topics: Option<Vec<RelatedTopic>>,
}
