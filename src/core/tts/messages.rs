//! Wire messages for the streaming synthesis session.
//!
//! - **Outgoing messages**: MessagePack-encoded binary frames
//!   - [`OutgoingMessage::Start`]: session parameters (sent first)
//!   - [`OutgoingMessage::Text`]: the text to speak
//!   - [`OutgoingMessage::Stop`]: end of input
//!
//! - **Incoming frames**: decoded by an ordered decoder chain
//!   1. MessagePack event map (binary audio)
//!   2. JSON event object (base64 audio)
//!   3. Raw audio bytes

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use serde_json::Value;

use super::config::SynthesisConfig;

// =============================================================================
// Outgoing Messages (Client to Server)
// =============================================================================

/// Session parameters carried by the `start` event.
///
/// `text` is always empty; the text itself follows in a `text` event.
#[derive(Debug, Clone, Serialize)]
pub struct StartRequest<'a> {
    pub text: &'a str,
    pub latency: &'static str,
    pub format: &'static str,
    pub reference_id: &'a str,
    pub temperature: f32,
    pub top_p: f32,
}

impl<'a> StartRequest<'a> {
    pub fn from_config(config: &'a SynthesisConfig) -> Self {
        Self {
            text: "",
            latency: config.latency.as_str(),
            format: config.streaming_format.as_str(),
            reference_id: &config.reference_id,
            temperature: config.temperature,
            top_p: config.top_p,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum OutgoingMessage<'a> {
    Start { request: StartRequest<'a> },
    Text { text: &'a str },
    Stop,
}

impl OutgoingMessage<'_> {
    /// Encode as a MessagePack map with named fields.
    pub fn encode(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(self)
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Text { .. } => "text",
            Self::Stop => "stop",
        }
    }
}

// =============================================================================
// Incoming Events (Server to Client)
// =============================================================================

/// An event produced by the provider during a streaming session.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// A chunk of encoded audio, in arrival order
    Audio(Bytes),
    /// The provider finished the session
    Finish { reason: Option<String> },
    /// Diagnostic output from the provider
    Log(String),
    /// The provider reported a failure
    Error(String),
    /// An event type this client does not handle
    Unknown(String),
}

impl ProviderEvent {
    fn from_parts(
        event: &str,
        audio: Option<Bytes>,
        message: Option<Value>,
        reason: Option<String>,
    ) -> Self {
        match event {
            "audio" => ProviderEvent::Audio(audio.unwrap_or_default()),
            "finish" if reason.as_deref() == Some("error") => ProviderEvent::Error(
                message
                    .map(value_to_string)
                    .unwrap_or_else(|| "session finished with an error".to_string()),
            ),
            "finish" => ProviderEvent::Finish { reason },
            "log" => ProviderEvent::Log(message.map(value_to_string).unwrap_or_default()),
            "error" => ProviderEvent::Error(
                message
                    .map(value_to_string)
                    .or(reason)
                    .unwrap_or_else(|| "unspecified provider error".to_string()),
            ),
            other => ProviderEvent::Unknown(other.to_string()),
        }
    }
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Which decoder tier produced a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeTier {
    MessagePack,
    Json,
    Raw,
}

impl DecodeTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MessagePack => "msgpack",
            Self::Json => "json",
            Self::Raw => "raw",
        }
    }
}

/// A decoded incoming frame tagged with the tier that understood it.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub tier: DecodeTier,
    pub event: ProviderEvent,
}

// =============================================================================
// Decoder Chain
// =============================================================================

type FrameDecoder = fn(&Bytes) -> Option<ProviderEvent>;

/// Decoders in the order they are tried.
const DECODER_CHAIN: [(DecodeTier, FrameDecoder); 3] = [
    (DecodeTier::MessagePack, decode_msgpack),
    (DecodeTier::Json, decode_json),
    (DecodeTier::Raw, decode_raw),
];

/// Decode one incoming frame. Returns `None` only for an empty frame.
pub fn decode_frame(data: &Bytes) -> Option<DecodedFrame> {
    DECODER_CHAIN.iter().find_map(|(tier, decoder)| {
        decoder(data).map(|event| DecodedFrame { tier: *tier, event })
    })
}

#[derive(Deserialize)]
struct MsgpackFrame {
    event: String,
    #[serde(default)]
    audio: Option<ByteBuf>,
    #[serde(default)]
    message: Option<Value>,
    #[serde(default)]
    reason: Option<String>,
}

fn decode_msgpack(data: &Bytes) -> Option<ProviderEvent> {
    let frame: MsgpackFrame = rmp_serde::from_slice(data).ok()?;
    let audio = frame.audio.map(|buf| Bytes::from(buf.into_vec()));
    Some(ProviderEvent::from_parts(
        &frame.event,
        audio,
        frame.message,
        frame.reason,
    ))
}

#[derive(Deserialize)]
struct JsonFrame {
    event: String,
    #[serde(default)]
    audio: Option<String>,
    #[serde(default)]
    message: Option<Value>,
    #[serde(default)]
    reason: Option<String>,
}

fn decode_json(data: &Bytes) -> Option<ProviderEvent> {
    let frame: JsonFrame = serde_json::from_slice(data).ok()?;
    let audio = match frame.audio {
        Some(encoded) => match BASE64.decode(encoded.as_bytes()) {
            Ok(decoded) => Some(Bytes::from(decoded)),
            Err(e) => {
                return Some(ProviderEvent::Error(format!(
                    "invalid base64 audio payload: {e}"
                )));
            }
        },
        None => None,
    };
    Some(ProviderEvent::from_parts(
        &frame.event,
        audio,
        frame.message,
        frame.reason,
    ))
}

fn decode_raw(data: &Bytes) -> Option<ProviderEvent> {
    if data.is_empty() {
        return None;
    }
    Some(ProviderEvent::Audio(data.clone()))
}
