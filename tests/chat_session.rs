use std::time::Duration;

use pretty_assertions::assert_eq;
use rx_chat::{
    format, ChatSession, CompletionClient, CompletionSettings, Config, Segment, Sender, SessionEvent,
    GREETING,
};
use tokio::sync::mpsc::UnboundedReceiver;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REPLY: &str = "### **Recommended Medication**\nTake **Ibuprofen**.";

fn mock_response(text: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [
            { "message": { "role": "assistant", "content": text } }
        ]
    })
}

fn session_for(server: &MockServer, api_key: Option<&str>) -> (ChatSession, UnboundedReceiver<SessionEvent>) {
    let config = Config {
        base_url: server.uri(),
        typing_interval_ms: 1,
        ..Config::default()
    };
    let client = CompletionClient::new(api_key.map(str::to_string), CompletionSettings::from(&config)).unwrap();
    ChatSession::new(client, config.typing_interval())
}

/// Feed events to the session until it is idle again, returning the segments
/// of every reveal frame seen on the way
async fn run_until_idle(
    session: &mut ChatSession,
    events: &mut UnboundedReceiver<SessionEvent>,
) -> Vec<Vec<Segment>> {
    let mut frames = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), async {
        while session.is_busy() {
            let event = events.recv().await.expect("session sender is alive");
            if let SessionEvent::RevealTick(frame) = &event {
                frames.push(frame.segments.clone());
            }
            session.handle(event);
        }
    })
    .await
    .expect("session settles");
    frames
}

#[tokio::test]
async fn test_headache_conversation() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_response(REPLY)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (mut session, mut events) = session_for(&mock_server, Some("test-api-key"));
    assert_eq!(session.history()[0].id(), 1);
    assert_eq!(session.history()[0].text(), GREETING);

    assert!(session.submit("I have a headache"));
    assert_eq!(session.history()[1].id(), 2);
    assert_eq!(session.history()[1].sender(), Sender::User);

    let frames = run_until_idle(&mut session, &mut events).await;

    // History sent upstream: system prompt, greeting, user message
    let requests = mock_server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let roles: Vec<&str> = body["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, vec!["system", "assistant", "user"]);
    assert_eq!(body["messages"][2]["content"], "I have a headache");

    let expected = vec![
        Segment::Heading(vec![Segment::PlainText("Recommended Medication".into())]),
        Segment::PlainText("\nTake ".into()),
        Segment::Bold("Ibuprofen".into()),
        Segment::PlainText(".".into()),
    ];
    assert_eq!(format(REPLY), expected);
    assert_eq!(frames.len(), REPLY.chars().count());
    assert_eq!(frames.last(), Some(&expected));

    let reply = &session.history()[2];
    assert_eq!(reply.id(), 3);
    assert_eq!(reply.sender(), Sender::Assistant);
    assert_eq!(reply.text(), REPLY);
    assert_eq!(session.error(), None);
}

#[tokio::test]
async fn test_failed_exchange_can_be_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_response("Rest and fluids.")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (mut session, mut events) = session_for(&mock_server, Some("test-api-key"));

    assert!(session.submit("Fever"));
    run_until_idle(&mut session, &mut events).await;
    assert_eq!(
        session.error(),
        Some("API request failed with status 503: overloaded")
    );
    // No assistant reply for the failed exchange
    assert_eq!(session.history().len(), 2);

    assert!(session.submit("Fever, still"));
    assert_eq!(session.error(), None);
    run_until_idle(&mut session, &mut events).await;

    let texts: Vec<(usize, Sender, &str)> = session
        .history()
        .iter()
        .map(|m| (m.id(), m.sender(), m.text()))
        .collect();
    assert_eq!(
        texts,
        vec![
            (1, Sender::Assistant, GREETING),
            (2, Sender::User, "Fever"),
            (3, Sender::User, "Fever, still"),
            (4, Sender::Assistant, "Rest and fluids."),
        ]
    );
}

#[tokio::test]
async fn test_missing_key_reports_configuration_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_response("unused")))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (mut session, mut events) = session_for(&mock_server, None);

    assert!(session.submit("I have a headache"));
    run_until_idle(&mut session, &mut events).await;

    assert_eq!(
        session.error(),
        Some("API key is missing. Please contact the administrator.")
    );
    assert_eq!(session.history().len(), 2);
}
