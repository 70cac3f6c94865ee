// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mineagent::error::{AgentError, ApiError};
use mineagent::llm::providers::CloudflareClient;
use mineagent::llm::{ChatBackend, Message};

const CHAT_MODEL: &str = "@cf/meta/llama-3.1-8b-instruct";

async fn mount_accounts(server: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": [{"id": "acc-123", "name": "Main"}]
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn history() -> Vec<Message> {
    vec![Message::user("what time is it?")]
}

#[tokio::test]
async fn test_account_id_resolved_once() {
    let server = MockServer::start().await;
    mount_accounts(&server, 1).await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/accounts/acc-123/ai/run/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"response": "It is noon."},
            "success": true
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = CloudflareClient::with_base_url("test-token", server.uri())
        .unwrap()
        .with_model(CHAT_MODEL);

    assert_eq!(client.chat(&history(), "sys").await.unwrap(), "It is noon.");
    assert_eq!(client.chat(&history(), "sys").await.unwrap(), "It is noon.");
}

#[tokio::test]
async fn test_configured_account_skips_lookup() {
    let server = MockServer::start().await;
    mount_accounts(&server, 0).await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/accounts/fixed-id/ai/run/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "plain"})))
        .mount(&server)
        .await;

    let client = CloudflareClient::with_base_url("test-token", server.uri())
        .unwrap()
        .with_model(CHAT_MODEL)
        .with_account_id("fixed-id");

    assert_eq!(client.chat(&history(), "sys").await.unwrap(), "plain");
}

#[tokio::test]
async fn test_chat_family_payload() {
    let server = MockServer::start().await;
    mount_accounts(&server, 1).await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/accounts/acc-123/ai/run/"))
        .and(body_partial_json(json!({
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "what time is it?"}
            ],
            "max_tokens": 256
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"choices": [{"message": {"content": "Noon."}}]}
        })))
        .mount(&server)
        .await;

    let client = CloudflareClient::with_base_url("test-token", server.uri())
        .unwrap()
        .with_model(CHAT_MODEL)
        .with_max_tokens(256);

    assert_eq!(client.chat(&history(), "be brief").await.unwrap(), "Noon.");
}

#[tokio::test]
async fn test_responses_family_payload_and_output_shape() {
    let server = MockServer::start().await;
    mount_accounts(&server, 1).await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/accounts/acc-123/ai/run/"))
        .and(body_partial_json(json!({
            "model": "@cf/openai/gpt-oss-20b",
            "instructions": "be brief",
            "input": [{"role": "user", "content": "what time is it?"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {
                "output": [
                    {"type": "reasoning", "content": [{"type": "reasoning_text", "text": "hmm"}]},
                    {"type": "message", "content": [
                        {"type": "output_text", "text": "It is"},
                        {"type": "output_text", "text": "noon."}
                    ]}
                ]
            }
        })))
        .mount(&server)
        .await;

    let client = CloudflareClient::with_base_url("test-token", server.uri())
        .unwrap()
        .with_model("@cf/openai/gpt-oss-20b");

    assert_eq!(
        client.chat(&history(), "be brief").await.unwrap(),
        "It is\nnoon."
    );
}

#[tokio::test]
async fn test_error_status_is_api_error() {
    let server = MockServer::start().await;
    mount_accounts(&server, 1).await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/accounts/acc-123/ai/run/"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let client = CloudflareClient::with_base_url("test-token", server.uri())
        .unwrap()
        .with_model(CHAT_MODEL);

    let err = client.chat(&history(), "sys").await.unwrap_err();
    match err {
        AgentError::Api(ApiError::Status { status, body }) => {
            assert_eq!(status, 429);
            assert_eq!(body, "slow down");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_shape_is_unparseable() {
    let server = MockServer::start().await;
    mount_accounts(&server, 1).await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/accounts/acc-123/ai/run/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {"weird": 1}})))
        .mount(&server)
        .await;

    let client = CloudflareClient::with_base_url("test-token", server.uri())
        .unwrap()
        .with_model(CHAT_MODEL);

    let err = client.chat(&history(), "sys").await.unwrap_err();
    assert!(matches!(err, AgentError::Api(ApiError::Unparseable(_))));
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn test_account_lookup_failure_is_config_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let client = CloudflareClient::with_base_url("bad-token", server.uri())
        .unwrap()
        .with_model(CHAT_MODEL);

    let err = client.chat(&history(), "sys").await.unwrap_err();
    assert!(matches!(err, AgentError::Config(_)));
    assert!(!err.is_recoverable());
}

#[tokio::test]
async fn test_empty_account_list_is_config_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
        .mount(&server)
        .await;

    let client = CloudflareClient::with_base_url("test-token", server.uri()).unwrap();
    let err = client.chat(&history(), "sys").await.unwrap_err();
    assert!(err.to_string().contains("no accounts"));
}

#[tokio::test]
async fn test_calls_after_shutdown_fail() {
    let server = MockServer::start().await;
    mount_accounts(&server, 0).await;

    let client = CloudflareClient::with_base_url("test-token", server.uri()).unwrap();
    client.shutdown();

    let err = client.chat(&history(), "sys").await.unwrap_err();
    assert!(matches!(err, AgentError::Config(_)));
}
