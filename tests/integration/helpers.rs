//! Shared helpers for integration tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use eleonor::audio::{AudioClip, AudioSink};
use eleonor::avatar::{AuthToken, TokenStore};
use eleonor::config::AvatarConfig;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

/// Marker recorded when a client sends a close frame.
pub(crate) const CLOSE: &str = "<close>";

/// How the mock control server answers.
#[derive(Debug, Clone)]
pub(crate) struct ServerBehavior {
    pub accept_auth: bool,
    pub api_error_on_auth: bool,
    /// Drop the socket, without a close frame, right after answering auth.
    pub drop_after_auth: bool,
    pub issued_token: String,
    pub expressions: Vec<Value>,
}

impl Default for ServerBehavior {
    fn default() -> Self {
        Self {
            accept_auth: true,
            api_error_on_auth: false,
            drop_after_auth: false,
            issued_token: "issued-token".to_owned(),
            expressions: vec![
                json!({ "name": "Feliz", "file": "Feliz.exp3.json", "active": false }),
                json!({ "name": "Enojo", "file": "Enojo.exp3.json", "active": true }),
            ],
        }
    }
}

/// One thing a client did, tagged with its connection number.
#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub connection: usize,
    /// `messageType` of the envelope, or [`CLOSE`].
    pub kind: String,
    pub envelope: Value,
}

/// In-process avatar control server that records everything it receives.
pub(crate) struct MockControlServer {
    pub url: String,
    connections: Arc<AtomicUsize>,
    received: Arc<Mutex<Vec<Recorded>>>,
    task: JoinHandle<()>,
}

impl MockControlServer {
    pub(crate) async fn start(behavior: ServerBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let connections = Arc::new(AtomicUsize::new(0));
        let received = Arc::new(Mutex::new(Vec::new()));

        let task = {
            let connections = Arc::clone(&connections);
            let received = Arc::clone(&received);
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let connection = connections.fetch_add(1, Ordering::SeqCst);
                    let received = Arc::clone(&received);
                    let behavior = behavior.clone();
                    tokio::spawn(async move {
                        let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                            return;
                        };
                        while let Some(Ok(msg)) = ws.next().await {
                            match msg {
                                Message::Text(text) => {
                                    let envelope: Value = serde_json::from_str(&text).unwrap();
                                    let kind = envelope["messageType"]
                                        .as_str()
                                        .unwrap_or_default()
                                        .to_owned();
                                    received.lock().unwrap().push(Recorded {
                                        connection,
                                        kind,
                                        envelope: envelope.clone(),
                                    });
                                    if let Some(reply) = respond(&behavior, &envelope) {
                                        if ws.send(Message::Text(reply.to_string())).await.is_err() {
                                            break;
                                        }
                                    }
                                    if behavior.drop_after_auth
                                        && envelope["messageType"] == "AuthenticationRequest"
                                    {
                                        break;
                                    }
                                }
                                Message::Close(_) => {
                                    received.lock().unwrap().push(Recorded {
                                        connection,
                                        kind: CLOSE.to_owned(),
                                        envelope: Value::Null,
                                    });
                                }
                                _ => {}
                            }
                        }
                    });
                }
            })
        };

        Self {
            url,
            connections,
            received,
            task,
        }
    }

    /// Number of TCP connections accepted so far.
    pub(crate) fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Everything received so far, in arrival order.
    pub(crate) fn received(&self) -> Vec<Recorded> {
        self.received.lock().unwrap().clone()
    }

    /// Kinds received on `connection`, in order.
    pub(crate) fn kinds_on(&self, connection: usize) -> Vec<String> {
        self.received()
            .into_iter()
            .filter(|r| r.connection == connection)
            .map(|r| r.kind)
            .collect()
    }

    /// Wait until `n` close frames have been recorded.
    pub(crate) async fn wait_for_closes(&self, n: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let closes = self.received().iter().filter(|r| r.kind == CLOSE).count();
            if closes >= n || tokio::time::Instant::now() >= deadline {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for MockControlServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn respond(behavior: &ServerBehavior, request: &Value) -> Option<Value> {
    let request_id = request["requestID"].clone();
    let reason = if behavior.accept_auth { "ok" } else { "token invalid" };
    let envelope = |message_type: &str, data: Value| {
        json!({
            "apiName": "VTubeStudioPublicAPI",
            "apiVersion": "1.0",
            "timestamp": 0,
            "requestID": request_id,
            "messageType": message_type,
            "data": data,
        })
    };

    match request["messageType"].as_str()? {
        "AuthenticationRequest" if behavior.api_error_on_auth => Some(envelope(
            "APIError",
            json!({ "errorID": 50, "message": "plugin blocked" }),
        )),
        "AuthenticationRequest" => Some(envelope(
            "AuthenticationResponse",
            json!({
                "authenticated": behavior.accept_auth,
                "reason": reason,
            }),
        )),
        "AuthenticationTokenRequest" => Some(envelope(
            "AuthenticationTokenResponse",
            json!({ "authenticationToken": behavior.issued_token }),
        )),
        "ExpressionActivationRequest" => Some(envelope("ExpressionActivationResponse", json!({}))),
        "ExpressionStateRequest" => Some(envelope(
            "ExpressionStateResponse",
            json!({ "modelLoaded": true, "expressions": behavior.expressions }),
        )),
        _ => None,
    }
}

/// Chat endpoint that streams `frames` and then holds the response open.
pub(crate) struct StallingChatServer {
    pub endpoint: String,
    task: JoinHandle<()>,
}

impl StallingChatServer {
    pub(crate) async fn start(frames: Vec<Value>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/api/chat/stream", listener.local_addr().unwrap());
        let body = stream_body(&frames);

        let task = tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let body = body.clone();
                tokio::spawn(async move {
                    let mut request = [0u8; 4096];
                    let _ = stream.read(&mut request).await;
                    let response = format!(
                        "HTTP/1.1 200 OK\r\n\
                         Content-Type: text/event-stream\r\n\
                         Transfer-Encoding: chunked\r\n\r\n\
                         {:x}\r\n{body}\r\n",
                        body.len()
                    );
                    if stream.write_all(response.as_bytes()).await.is_err() {
                        return;
                    }
                    let _ = stream.flush().await;
                    // Never send the final chunk.
                    std::future::pending::<()>().await;
                });
            }
        });

        Self { endpoint, task }
    }
}

impl Drop for StallingChatServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Avatar config pointing at `url` with a short dwell.
pub(crate) fn avatar_config(url: &str, token_file: PathBuf) -> AvatarConfig {
    AvatarConfig {
        url: url.to_owned(),
        token_file: Some(token_file),
        dwell_ms: 50,
        response_timeout_ms: 2000,
        ..AvatarConfig::default()
    }
}

/// Write a token file under `dir` and return its path.
pub(crate) async fn write_token(dir: &Path, token: &str) -> PathBuf {
    let path = dir.join("vts_token.json");
    TokenStore::new(&path)
        .save(&AuthToken::new(token))
        .await
        .unwrap();
    path
}

/// Frame each JSON value as one `data:` line of a chat stream body.
pub(crate) fn stream_body(frames: &[Value]) -> String {
    frames
        .iter()
        .map(|frame| format!("data: {frame}\n\n"))
        .collect()
}

/// Audio sink that records payloads without playing anything.
#[derive(Default)]
pub(crate) struct RecordingSink {
    pub played: Mutex<Vec<String>>,
}

#[async_trait]
impl AudioSink for RecordingSink {
    async fn play(&self, clip: &AudioClip, _cancel: CancellationToken) -> eleonor::Result<()> {
        self.played.lock().unwrap().push(clip.payload.clone());
        Ok(())
    }
}
