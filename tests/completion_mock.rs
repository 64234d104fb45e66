use std::time::Duration;

use rx_chat::completion::SYSTEM_PROMPT;
use rx_chat::conversation::{ChatTurn, Role};
use rx_chat::{CompletionClient, CompletionError, CompletionSettings, Config};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn mock_response(text: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "gen-123",
        "model": "deepseek/deepseek-chat",
        "choices": [
            {
                "index": 0,
                "finish_reason": "stop",
                "message": { "role": "assistant", "content": text }
            }
        ],
        "usage": { "prompt_tokens": 10, "completion_tokens": 20 }
    })
}

fn settings_for(server: &MockServer) -> CompletionSettings {
    let config = Config {
        base_url: server.uri(),
        ..Config::default()
    };
    CompletionSettings::from(&config)
}

fn history() -> Vec<ChatTurn> {
    vec![
        ChatTurn::new(Role::Assistant, "Please describe your symptoms."),
        ChatTurn::new(Role::User, "Sore throat"),
    ]
}

#[tokio::test]
async fn test_complete_sends_headers_and_returns_reply() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-api-key"))
        .and(header("content-type", "application/json"))
        .and(header("http-referer", "http://localhost"))
        .and(header("x-title", "Drug Recommendation Chatbot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_response("Try **lozenges**.")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = CompletionClient::new(Some("test-api-key".into()), settings_for(&mock_server)).unwrap();
    let reply = client.complete(&history()).await.unwrap();
    assert_eq!(reply, "Try **lozenges**.");

    let requests = mock_server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["model"], "deepseek/deepseek-chat");
    assert_eq!(body["max_tokens"], 512);
    assert_eq!(body["stream"], false);
    assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);

    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[0]["content"], SYSTEM_PROMPT);
    assert_eq!(messages[2], serde_json::json!({"role": "user", "content": "Sore throat"}));
}

#[tokio::test]
async fn test_missing_key_never_reaches_endpoint() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_response("unused")))
        .expect(0)
        .mount(&mock_server)
        .await;

    for key in [None, Some(String::new()), Some("YOUR_API_KEY_HERE".to_string())] {
        let client = CompletionClient::new(key, settings_for(&mock_server)).unwrap();
        let err = client.complete(&history()).await.unwrap_err();
        assert!(matches!(err, CompletionError::Configuration));
        assert_eq!(err.to_string(), "API key is missing. Please contact the administrator.");
    }
}

#[tokio::test]
async fn test_error_status_is_protocol_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = CompletionClient::new(Some("test-api-key".into()), settings_for(&mock_server)).unwrap();
    let err = client.complete(&history()).await.unwrap_err();

    match err {
        CompletionError::Protocol(message) => {
            assert_eq!(message, "API request failed with status 429: rate limited");
        }
        other => panic!("expected a protocol error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_body_without_reply_is_protocol_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
        .mount(&mock_server)
        .await;

    let client = CompletionClient::new(Some("test-api-key".into()), settings_for(&mock_server)).unwrap();
    let err = client.complete(&history()).await.unwrap_err();

    assert!(matches!(&err, CompletionError::Protocol(m) if m == "Invalid response format from API"));
}

#[tokio::test]
async fn test_slow_endpoint_times_out_as_transport_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(mock_response("too late"))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;

    let mut settings = settings_for(&mock_server);
    settings.timeout = Duration::from_millis(200);

    let client = CompletionClient::new(Some("test-api-key".into()), settings).unwrap();
    let err = client.complete(&history()).await.unwrap_err();

    assert!(matches!(err, CompletionError::Transport(_)), "got {err:?}");
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transport_error() {
    let config = Config {
        // Nothing listens on the discard port
        base_url: "http://127.0.0.1:9".to_string(),
        request_timeout_secs: 2,
        ..Config::default()
    };

    let client = CompletionClient::new(Some("test-api-key".into()), CompletionSettings::from(&config)).unwrap();
    let err = client.complete(&history()).await.unwrap_err();

    assert!(matches!(err, CompletionError::Transport(_)), "got {err:?}");
}
