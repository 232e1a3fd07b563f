//! Speech synthesis transport.
//!
//! A [`DualTransportClient`] turns one segment of text into encoded audio,
//! trying a low-latency WebSocket session first and a single HTTP request
//! second. The [`SessionRegistry`] is the only state shared between calls.

mod base;
mod client;
mod config;
mod fallback;
pub mod messages;
mod registry;
mod streaming;

#[cfg(test)]
mod tests;

/// Streaming synthesis endpoint
pub const FISH_TTS_WS_URL: &str = "wss://api.fish.audio/v1/tts/live";

/// Single-shot synthesis endpoint
pub const FISH_TTS_HTTP_URL: &str = "https://api.fish.audio/v1/tts";

pub use base::{SpeechSynthesizer, SynthesisError, SynthesisResult};
pub use client::{DualTransportClient, TransportPath};
pub use config::{
    AudioFormat, DEFAULT_MP3_BITRATE, DEFAULT_REQUEST_TIMEOUT, DEFAULT_STREAM_IDLE_TIMEOUT,
    DEFAULT_TEMPERATURE, DEFAULT_TOP_P, LatencyMode, SynthesisConfig,
};
pub use fallback::FallbackClient;
pub use messages::{DecodeTier, DecodedFrame, OutgoingMessage, ProviderEvent, decode_frame};
pub use registry::{SessionGuard, SessionRegistry};
pub use streaming::stream_synthesis;
