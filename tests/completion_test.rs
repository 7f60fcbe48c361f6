//! HTTP completion client tests against a mock endpoint.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use reagent::completion::{CompletionClient, CompletionOptions, HttpCompletionClient};
use reagent::config::{CompletionEndpointConfig, RequestConfig};
use reagent::error::CompletionError;

fn endpoint_config(base_url: &str) -> CompletionEndpointConfig {
    CompletionEndpointConfig {
        base_url: base_url.to_string(),
        api_key: "test-key".to_string(),
        model: "test-model".to_string(),
        temperature: 0.6,
        max_tokens: 800,
    }
}

#[tokio::test]
async fn test_complete_returns_trimmed_content() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_partial_json(json!({"model": "test-model"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "  hello there  "}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 3, "total_tokens": 13}
        })))
        .mount(&server)
        .await;

    let client =
        HttpCompletionClient::new(&endpoint_config(&server.uri()), &RequestConfig::default())
            .unwrap();

    let text = client
        .complete("say hello", &CompletionOptions::default())
        .await
        .unwrap();

    assert_eq!(text, "hello there");
}

#[tokio::test]
async fn test_complete_sends_requested_options() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "temperature": 0.0,
            "max_tokens": 200
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "ok"}}]
        })))
        .mount(&server)
        .await;

    let client =
        HttpCompletionClient::new(&endpoint_config(&server.uri()), &RequestConfig::default())
            .unwrap();

    let text = client
        .complete("rate this", &CompletionOptions::deterministic(200))
        .await
        .unwrap();

    assert_eq!(text, "ok");
}

#[tokio::test]
async fn test_api_error_status_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model exploded"))
        .mount(&server)
        .await;

    let client =
        HttpCompletionClient::new(&endpoint_config(&server.uri()), &RequestConfig::default())
            .unwrap();

    let err = client
        .complete("anything", &CompletionOptions::default())
        .await
        .unwrap_err();

    match err {
        CompletionError::Api { status, message } => {
            assert_eq!(status, 500);
            assert!(message.contains("model exploded"));
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json at all"))
        .mount(&server)
        .await;

    let client =
        HttpCompletionClient::new(&endpoint_config(&server.uri()), &RequestConfig::default())
            .unwrap();

    let err = client
        .complete("anything", &CompletionOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, CompletionError::InvalidResponse { .. }));
}

#[tokio::test]
async fn test_empty_choices_is_invalid_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let client =
        HttpCompletionClient::new(&endpoint_config(&server.uri()), &RequestConfig::default())
            .unwrap();

    let err = client
        .complete("anything", &CompletionOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, CompletionError::InvalidResponse { .. }));
}

#[test]
fn test_base_url_is_normalized() {
    let client = HttpCompletionClient::new(
        &endpoint_config("http://localhost:1234/v1/"),
        &RequestConfig::default(),
    )
    .unwrap();

    assert_eq!(client.base_url(), "http://localhost:1234/v1");
}
