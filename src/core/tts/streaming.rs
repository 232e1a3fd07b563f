//! Streaming synthesis over a WebSocket session.
//!
//! One session per call: connect with a bearer token, send `start`, `text`
//! and `stop` as MessagePack frames, then collect audio events until the
//! provider finishes or closes the socket. The session fails with a timeout
//! once the idle window passes without new audio, and aborts promptly when
//! its cancellation token fires.

use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use tokio::time::{Instant, sleep_until, timeout};
use tokio_tungstenite::tungstenite::handshake::client::generate_key;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::base::{SynthesisError, SynthesisResult};
use super::config::SynthesisConfig;
use super::messages::{DecodedFrame, OutgoingMessage, ProviderEvent, StartRequest, decode_frame};

/// Run one streaming session for `text` and return the concatenated audio.
pub async fn stream_synthesis(
    config: &SynthesisConfig,
    text: &str,
    cancel: &CancellationToken,
) -> SynthesisResult<Bytes> {
    let url = Url::parse(&config.ws_url).map_err(|e| {
        SynthesisError::InvalidConfiguration(format!(
            "Invalid WebSocket URL {}: {e}",
            config.ws_url
        ))
    })?;
    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => {
            return Err(SynthesisError::InvalidConfiguration(format!(
                "WebSocket URL has no host: {}",
                config.ws_url
            )));
        }
    };

    let request = tokio_tungstenite::tungstenite::http::Request::builder()
        .method("GET")
        .uri(config.ws_url.as_str())
        .header("Host", host)
        .header("Upgrade", "websocket")
        .header("Connection", "upgrade")
        .header("Sec-WebSocket-Key", generate_key())
        .header("Sec-WebSocket-Version", "13")
        .header("Authorization", format!("Bearer {}", config.api_key))
        .body(())
        .map_err(|e| {
            SynthesisError::ConnectionFailed(format!("Failed to create WebSocket request: {e}"))
        })?;

    let connect = timeout(config.stream_idle_timeout, connect_async(request));
    let (ws_stream, _response) = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(SynthesisError::Cancelled),
        result = connect => match result {
            Ok(Ok(connected)) => connected,
            Ok(Err(e)) => {
                return Err(SynthesisError::ConnectionFailed(format!(
                    "Failed to connect to streaming endpoint: {e}"
                )));
            }
            Err(_elapsed) => return Err(SynthesisError::Timeout(config.stream_idle_timeout)),
        },
    };

    info!(chars = text.chars().count(), "Streaming synthesis session opened");

    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    let outgoing = [
        OutgoingMessage::Start {
            request: StartRequest::from_config(config),
        },
        OutgoingMessage::Text { text },
        OutgoingMessage::Stop,
    ];
    for message in &outgoing {
        let payload = message
            .encode()
            .map_err(|e| SynthesisError::EncodingError(e.to_string()))?;
        ws_sink
            .send(Message::Binary(payload.into()))
            .await
            .map_err(|e| {
                SynthesisError::NetworkError(format!(
                    "Failed to send {} event: {e}",
                    message.event_name()
                ))
            })?;
        debug!(event = message.event_name(), "Sent streaming event");
    }

    let mut audio = BytesMut::new();
    let mut frames = 0usize;

    // Only audio counts as progress; logs and pings do not keep a session alive.
    let idle = sleep_until(Instant::now() + config.stream_idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                info!("Streaming synthesis session cancelled");
                let _ = ws_sink.send(Message::Close(None)).await;
                return Err(SynthesisError::Cancelled);
            }

            _ = &mut idle => {
                warn!(frames = frames, "No streaming audio within the idle window");
                let _ = ws_sink.send(Message::Close(None)).await;
                return Err(SynthesisError::Timeout(config.stream_idle_timeout));
            }

            message = ws_stream.next() => {
                let data = match message {
                    Some(Ok(Message::Binary(data))) => data,
                    Some(Ok(Message::Text(text))) => Bytes::from(text.as_str().to_owned()),
                    Some(Ok(Message::Close(frame))) => {
                        debug!("Streaming endpoint closed the session: {:?}", frame);
                        break;
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                    Some(Err(e)) => {
                        return Err(SynthesisError::NetworkError(format!("WebSocket error: {e}")));
                    }
                    None => {
                        debug!("Streaming endpoint stream ended");
                        break;
                    }
                };

                let Some(DecodedFrame { tier, event }) = decode_frame(&data) else {
                    continue;
                };

                match event {
                    ProviderEvent::Audio(chunk) => {
                        if !chunk.is_empty() {
                            frames += 1;
                            debug!(
                                tier = tier.as_str(),
                                bytes = chunk.len(),
                                "Received audio chunk"
                            );
                            audio.extend_from_slice(&chunk);
                            idle.as_mut().reset(Instant::now() + config.stream_idle_timeout);
                        }
                    }
                    ProviderEvent::Finish { reason } => {
                        debug!(reason = ?reason, "Streaming session finished");
                        let _ = ws_sink.send(Message::Close(None)).await;
                        break;
                    }
                    ProviderEvent::Log(message) => {
                        debug!(tier = tier.as_str(), "Provider log: {}", message);
                    }
                    ProviderEvent::Error(message) => {
                        warn!("Streaming provider reported an error: {}", message);
                        let _ = ws_sink.send(Message::Close(None)).await;
                        return Err(SynthesisError::ProviderError(message));
                    }
                    ProviderEvent::Unknown(event) => {
                        debug!(event = %event, "Ignoring unknown streaming event");
                    }
                }
            }
        }
    }

    if audio.is_empty() {
        return Err(SynthesisError::NoAudio);
    }

    info!(
        frames = frames,
        bytes = audio.len(),
        "Streaming synthesis session complete"
    );
    Ok(audio.freeze())
}
