//! WebSocket Mock Server for the streaming synthesis endpoint
//!
//! Accepts any number of sessions. Each session records the client's
//! MessagePack events until `stop`, then plays its script back.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use serde_bytes::ByteBuf;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::accept_hdr_async;

/// One scripted server action, run after the client's `stop` event.
#[derive(Debug, Clone)]
pub enum Step {
    Send(Message),
    Sleep(Duration),
    Close,
}

#[derive(Serialize)]
struct Frame<'a> {
    event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio: Option<ByteBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
}

fn msgpack(frame: &Frame<'_>) -> Step {
    Step::Send(Message::Binary(
        rmp_serde::to_vec_named(frame).unwrap().into(),
    ))
}

pub fn audio_msgpack(audio: &[u8]) -> Step {
    msgpack(&Frame {
        event: "audio",
        audio: Some(ByteBuf::from(audio.to_vec())),
        message: None,
        reason: None,
    })
}

pub fn finish_msgpack(reason: &str) -> Step {
    msgpack(&Frame {
        event: "finish",
        audio: None,
        message: None,
        reason: Some(reason),
    })
}

pub fn log_msgpack(message: &str) -> Step {
    msgpack(&Frame {
        event: "log",
        audio: None,
        message: Some(message),
        reason: None,
    })
}

pub fn audio_json(audio: &[u8]) -> Step {
    let frame = json!({ "event": "audio", "audio": BASE64.encode(audio) });
    Step::Send(Message::Text(frame.to_string().into()))
}

pub fn error_json(message: &str) -> Step {
    let frame = json!({ "event": "error", "message": message });
    Step::Send(Message::Text(frame.to_string().into()))
}

pub fn raw_audio(audio: &[u8]) -> Step {
    Step::Send(Message::Binary(audio.to_vec().into()))
}

#[derive(Default)]
struct MockState {
    received: Mutex<Vec<Value>>,
    authorization: Mutex<Vec<String>>,
    connections: AtomicUsize,
}

pub struct MockStreamingServer {
    addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockStreamingServer {
    pub async fn start(script: Vec<Step>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(MockState::default());

        let accept_state = Arc::clone(&state);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let script = script.clone();
                let state = Arc::clone(&accept_state);
                tokio::spawn(async move {
                    if let Err(e) = handle_session(stream, script, state).await {
                        eprintln!("Mock streaming session error: {}", e);
                    }
                });
            }
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/v1/tts/live", self.addr)
    }

    /// Every event received, across sessions, in arrival order.
    pub fn received(&self) -> Vec<Value> {
        self.state.received.lock().clone()
    }

    pub fn received_event_names(&self) -> Vec<String> {
        self.received()
            .iter()
            .filter_map(|event| event.get("event").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }

    pub fn authorization_headers(&self) -> Vec<String> {
        self.state.authorization.lock().clone()
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }
}

/// A ws:// URL nothing is listening on.
pub async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{}/v1/tts/live", addr)
}

async fn handle_session(
    stream: TcpStream,
    script: Vec<Step>,
    state: Arc<MockState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let header_state = Arc::clone(&state);
    let ws_stream = accept_hdr_async(
        stream,
        move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            if let Some(value) = request
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
            {
                header_state.authorization.lock().push(value.to_string());
            }
            Ok(response)
        },
    )
    .await?;
    state.connections.fetch_add(1, Ordering::SeqCst);

    let (mut write, mut read) = ws_stream.split();

    while let Some(message) = read.next().await {
        match message? {
            Message::Binary(data) => {
                let event: Value = rmp_serde::from_slice(&data)?;
                let is_stop = event.get("event").and_then(Value::as_str) == Some("stop");
                state.received.lock().push(event);
                if is_stop {
                    break;
                }
            }
            Message::Close(_) => return Ok(()),
            _ => {}
        }
    }

    for step in script {
        match step {
            Step::Send(message) => write.send(message).await?,
            Step::Sleep(duration) => tokio::time::sleep(duration).await,
            Step::Close => {
                write.send(Message::Close(None)).await?;
                break;
            }
        }
    }

    // Drain until the client goes away
    while let Some(Ok(message)) = read.next().await {
        if let Message::Close(_) = message {
            break;
        }
    }

    Ok(())
}
