//! Chat turns against a mock chat endpoint.

use std::sync::Arc;

use eleonor::audio::AudioScheduler;
use eleonor::avatar::DirectivePolicy;
use eleonor::chat::{ChatClient, ChatSession, Role, StreamEvent, TurnStatus};
use eleonor::config::ChatConfig;
use futures_util::StreamExt;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::{RecordingSink, stream_body};

async fn mock_stream(server: &MockServer, body: String) {
    Mock::given(method("POST"))
        .and(path("/api/chat/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(server)
        .await;
}

fn chat_config(server: &MockServer) -> ChatConfig {
    ChatConfig {
        endpoint: format!("{}/api/chat/stream", server.uri()),
        ..ChatConfig::default()
    }
}

fn session_with_sink(server: &MockServer, sink: Arc<RecordingSink>) -> ChatSession {
    let client = ChatClient::new(&chat_config(server)).unwrap();
    let audio = AudioScheduler::spawn(sink, true);
    ChatSession::new(client, audio, None, DirectivePolicy::FirstWins)
}

#[tokio::test]
async fn client_posts_prompt_and_decodes_events() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/stream"))
        .and(body_json(json!({ "text": "hola" })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            stream_body(&[
                json!({ "type": "text", "content": "Ho" }),
                json!({ "type": "text", "content": "la" }),
                json!({ "type": "done" }),
            ]),
            "text/event-stream",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatClient::new(&chat_config(&server)).unwrap();
    let events: Vec<StreamEvent> = client.open("hola").await.unwrap().collect().await;
    assert_eq!(
        events,
        vec![
            StreamEvent::Text("Ho".into()),
            StreamEvent::Text("la".into()),
            StreamEvent::Done,
        ]
    );
}

#[tokio::test]
async fn turn_assembles_text_in_order() {
    let server = MockServer::start().await;
    mock_stream(
        &server,
        stream_body(&[
            json!({ "type": "text", "content": "Hello" }),
            json!({ "type": "text", "content": ", " }),
            json!({ "type": "text", "content": "world" }),
            json!({ "type": "done" }),
        ]),
    )
    .await;

    let mut session = session_with_sink(&server, Arc::new(RecordingSink::default()));
    let live = session.live_view();
    let outcome = session.send("hi", CancellationToken::new()).await;

    assert_eq!(outcome.status, TurnStatus::Completed);
    assert_eq!(outcome.message.content, "Hello, world");
    assert_eq!(outcome.message.role, Role::Assistant);
    assert_eq!(*live.borrow(), "Hello, world");

    let history = session.history().messages();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "hi");
    assert_eq!(history[1].content, "Hello, world");
}

#[tokio::test]
async fn directive_is_stripped_and_selected() {
    let server = MockServer::start().await;
    mock_stream(
        &server,
        stream_body(&[
            json!({ "type": "text", "content": "Great! [expression:" }),
            json!({ "type": "text", "content": "Feliz] Keep practicing." }),
            json!({ "type": "done" }),
        ]),
    )
    .await;

    let mut session = session_with_sink(&server, Arc::new(RecordingSink::default()));
    let outcome = session.send("how am I doing?", CancellationToken::new()).await;

    assert_eq!(outcome.status, TurnStatus::Completed);
    assert_eq!(outcome.message.content, "Great! Keep practicing.");
    assert_eq!(outcome.directive.as_deref(), Some("Feliz"));
    // No trigger configured: nothing fired.
    assert!(outcome.avatar_task.is_none());
    assert_eq!(
        session.history().last().map(|m| m.content.as_str()),
        Some("Great! Keep practicing.")
    );
}

#[tokio::test]
async fn audio_clips_play_once_in_arrival_order() {
    let server = MockServer::start().await;
    mock_stream(
        &server,
        stream_body(&[
            json!({ "type": "audio", "content": "clip-1" }),
            json!({ "type": "text", "content": "One" }),
            json!({ "type": "audio", "content": "clip-2" }),
            json!({ "type": "audio", "content": "clip-3" }),
            json!({ "type": "done" }),
        ]),
    )
    .await;

    let sink = Arc::new(RecordingSink::default());
    let mut session = session_with_sink(&server, Arc::clone(&sink));
    let outcome = session.send("speak", CancellationToken::new()).await;
    assert_eq!(outcome.status, TurnStatus::Completed);

    session.audio().wait_idle().await;
    assert_eq!(
        *sink.played.lock().unwrap(),
        vec!["clip-1", "clip-2", "clip-3"]
    );
}

#[tokio::test]
async fn disabled_audio_discards_clips() {
    let server = MockServer::start().await;
    mock_stream(
        &server,
        stream_body(&[
            json!({ "type": "audio", "content": "clip-1" }),
            json!({ "type": "done" }),
        ]),
    )
    .await;

    let sink = Arc::new(RecordingSink::default());
    let mut session = session_with_sink(&server, Arc::clone(&sink));
    session.set_audio_enabled(false).await;
    session.send("speak", CancellationToken::new()).await;

    session.audio().wait_idle().await;
    assert!(sink.played.lock().unwrap().is_empty());
}

#[tokio::test]
async fn error_event_is_annotated_after_partial_text() {
    let server = MockServer::start().await;
    mock_stream(
        &server,
        stream_body(&[
            json!({ "type": "text", "content": "Partial" }),
            json!({ "type": "error", "content": "model overloaded" }),
            json!({ "type": "text", "content": "ignored" }),
        ]),
    )
    .await;

    let mut session = session_with_sink(&server, Arc::new(RecordingSink::default()));
    let outcome = session.send("hi", CancellationToken::new()).await;

    assert_eq!(
        outcome.status,
        TurnStatus::Failed("model overloaded".to_owned())
    );
    assert_eq!(outcome.message.content, "Partial\n\nError: model overloaded");
    assert!(outcome.directive.is_none());
}

#[tokio::test]
async fn malformed_frames_are_skipped() {
    let server = MockServer::start().await;
    let body = format!(
        "data: {{not json\n\n{}data: {{\"type\":\"telemetry\",\"content\":\"x\"}}\n\n{}",
        stream_body(&[json!({ "type": "text", "content": "ok" })]),
        stream_body(&[json!({ "type": "done" })]),
    );
    mock_stream(&server, body).await;

    let mut session = session_with_sink(&server, Arc::new(RecordingSink::default()));
    let outcome = session.send("hi", CancellationToken::new()).await;
    assert_eq!(outcome.status, TurnStatus::Completed);
    assert_eq!(outcome.message.content, "ok");
}

#[tokio::test]
async fn exhausted_stream_without_done_completes() {
    let server = MockServer::start().await;
    mock_stream(
        &server,
        stream_body(&[json!({ "type": "text", "content": "no terminator" })]),
    )
    .await;

    let mut session = session_with_sink(&server, Arc::new(RecordingSink::default()));
    let outcome = session.send("hi", CancellationToken::new()).await;
    assert_eq!(outcome.status, TurnStatus::Completed);
    assert_eq!(outcome.message.content, "no terminator");
}

#[tokio::test]
async fn http_error_status_fails_turn_visibly() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/stream"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend down"))
        .mount(&server)
        .await;

    let mut session = session_with_sink(&server, Arc::new(RecordingSink::default()));
    let outcome = session.send("hi", CancellationToken::new()).await;

    match &outcome.status {
        TurnStatus::Failed(reason) => assert!(reason.contains("500")),
        other => panic!("unexpected status: {other:?}"),
    }
    assert!(outcome.message.content.starts_with("Error: "));
    assert!(outcome.message.content.contains("backend down"));
}
