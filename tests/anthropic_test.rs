//! Wiremock tests for the Anthropic backend.
#![cfg(feature = "anthropic")]

use bifrost::providers::AnthropicProvider;
use bifrost::providers::anthropic::{API_VERSION, DEFAULT_MAX_TOKENS};
use bifrost::{BifrostError, InferenceRequest, Provider, ProviderConfig};
use serde_json::json;
use wiremock::matchers::{
    body_partial_json, header, method, path, query_param, query_param_is_missing,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer) -> AnthropicProvider {
    let config = ProviderConfig {
        base_url: Some(server.uri()),
        api_key: Some("sk-ant-test".into()),
        ..Default::default()
    };
    AnthropicProvider::new("anthropic", &config).unwrap()
}

async fn mount_models(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .and(header("x-api-key", "sk-ant-test"))
        .and(header("anthropic-version", API_VERSION))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "claude-sonnet-4-5", "type": "model"}],
            "has_more": false
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn message_success_joins_text_blocks() {
    let server = MockServer::start().await;
    mount_models(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-ant-test"))
        .and(body_partial_json(json!({
            "model": "claude-sonnet-4-5",
            "max_tokens": DEFAULT_MAX_TOKENS,
            "system": "be brief",
            "messages": [{"role": "user", "content": "hi"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "claude-sonnet-4-5",
            "content": [
                {"type": "text", "text": "Hel"},
                {"type": "tool_use", "id": "t1", "name": "x", "input": {}},
                {"type": "text", "text": "lo"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 8, "output_tokens": 3}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = InferenceRequest::new("claude-sonnet-4-5", "hi").system("be brief");
    let response = provider(&server).execute(&request).await.unwrap();

    assert_eq!(response.text, "Hello");
    let usage = response.usage.unwrap();
    assert_eq!(usage.prompt_tokens, Some(8));
    assert_eq!(usage.completion_tokens, Some(3));
}

#[tokio::test]
async fn overloaded_is_transient_network_error() {
    let server = MockServer::start().await;
    mount_models(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(529).set_body_json(json!({
            "type": "error",
            "error": {"type": "overloaded_error", "message": "Overloaded"}
        })))
        .mount(&server)
        .await;

    let err = provider(&server)
        .execute(&InferenceRequest::new("claude-sonnet-4-5", "hi"))
        .await
        .unwrap_err();

    assert!(matches!(err, BifrostError::Network { status: Some(529), ref message, .. } if message.contains("Overloaded")));
    assert!(err.is_transient());
}

#[tokio::test]
async fn invalid_request_is_validation_error() {
    let server = MockServer::start().await;
    mount_models(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "type": "error",
            "error": {"type": "invalid_request_error", "message": "max_tokens: too large"}
        })))
        .mount(&server)
        .await;

    let err = provider(&server)
        .execute(&InferenceRequest::new("claude-sonnet-4-5", "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, BifrostError::Validation(ref m) if m.contains("max_tokens")));
}

#[tokio::test]
async fn model_outside_list_is_rejected_locally() {
    let server = MockServer::start().await;
    mount_models(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = provider(&server)
        .execute(&InferenceRequest::new("claude-1", "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, BifrostError::Validation(_)));
}

#[tokio::test]
async fn model_listing_follows_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .and(query_param("limit", "1000"))
        .and(query_param_is_missing("after_id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "claude-sonnet-4-5", "type": "model"}],
            "has_more": true,
            "first_id": "claude-sonnet-4-5",
            "last_id": "claude-sonnet-4-5"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .and(query_param("after_id", "claude-sonnet-4-5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "claude-3-haiku-20240307", "type": "model"}],
            "has_more": false,
            "first_id": "claude-3-haiku-20240307",
            "last_id": "claude-3-haiku-20240307"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_partial_json(json!({"model": "claude-3-haiku-20240307"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "claude-3-haiku-20240307",
            "content": [{"type": "text", "text": "hi there"}],
            "usage": {"input_tokens": 1, "output_tokens": 2}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server);
    assert_eq!(
        provider.list_models().await.unwrap(),
        vec!["claude-sonnet-4-5", "claude-3-haiku-20240307"]
    );
    let response = provider
        .execute(&InferenceRequest::new("claude-3-haiku-20240307", "hi"))
        .await
        .unwrap();
    assert_eq!(response.text, "hi there");
}

#[test]
fn missing_key_is_configuration_error() {
    // SAFETY: no other test in this binary reads ANTHROPIC_API_KEY concurrently
    unsafe { std::env::remove_var("ANTHROPIC_API_KEY") };
    let err = AnthropicProvider::new("anthropic", &ProviderConfig::default())
        .err()
        .unwrap();
    assert!(matches!(err, BifrostError::Configuration(ref m) if m.contains("apiKey")));
}
