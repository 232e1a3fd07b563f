//! Configuration types for the speech provider transports.
//!
//! - Audio format selection for the streaming and fallback paths
//! - Latency mode for the streaming session
//! - Sampling parameters, endpoints and timeouts

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use super::base::SynthesisError;
use super::{FISH_TTS_HTTP_URL, FISH_TTS_WS_URL};

/// Default idle window for a streaming session
pub const DEFAULT_STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default request timeout for the fallback call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default MP3 bitrate (kbps) requested from the fallback endpoint
pub const DEFAULT_MP3_BITRATE: u32 = 128;

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default nucleus sampling value
pub const DEFAULT_TOP_P: f32 = 0.7;

// =============================================================================
// Audio Format
// =============================================================================

/// Encoded audio formats the provider can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Wav,
    Opus,
    Pcm,
}

impl AudioFormat {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Opus => "opus",
            Self::Pcm => "pcm",
        }
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mp3" | "mpeg" => Ok(Self::Mp3),
            "wav" | "wave" => Ok(Self::Wav),
            "opus" | "ogg" => Ok(Self::Opus),
            "pcm" | "raw" => Ok(Self::Pcm),
            other => Err(format!("Unsupported audio format: {other}")),
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Latency Mode
// =============================================================================

/// Latency/quality trade-off requested at session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyMode {
    #[default]
    Normal,
    Balanced,
}

impl LatencyMode {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Balanced => "balanced",
        }
    }
}

impl FromStr for LatencyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "balanced" | "low" => Ok(Self::Balanced),
            other => Err(format!("Unsupported latency mode: {other}")),
        }
    }
}

impl std::fmt::Display for LatencyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Synthesis Config
// =============================================================================

/// Everything the streaming and fallback transports need to reach the provider.
#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    pub api_key: String,
    /// Voice model identifier
    pub reference_id: String,
    pub ws_url: String,
    pub http_url: String,
    pub streaming_format: AudioFormat,
    pub fallback_format: AudioFormat,
    pub mp3_bitrate: u32,
    pub latency: LatencyMode,
    pub temperature: f32,
    pub top_p: f32,
    /// Longest gap tolerated between two streaming frames
    pub stream_idle_timeout: Duration,
    /// Upper bound for one fallback request
    pub request_timeout: Duration,
}

impl SynthesisConfig {
    /// Config with provider defaults for everything but credentials.
    pub fn new(api_key: impl Into<String>, reference_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            reference_id: reference_id.into(),
            ws_url: FISH_TTS_WS_URL.to_string(),
            http_url: FISH_TTS_HTTP_URL.to_string(),
            streaming_format: AudioFormat::Mp3,
            fallback_format: AudioFormat::Mp3,
            mp3_bitrate: DEFAULT_MP3_BITRATE,
            latency: LatencyMode::Normal,
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            stream_idle_timeout: DEFAULT_STREAM_IDLE_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_endpoints(
        mut self,
        ws_url: impl Into<String>,
        http_url: impl Into<String>,
    ) -> Self {
        self.ws_url = ws_url.into();
        self.http_url = http_url.into();
        self
    }

    pub fn with_stream_idle_timeout(mut self, timeout: Duration) -> Self {
        self.stream_idle_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), SynthesisError> {
        if self.api_key.trim().is_empty() {
            return Err(SynthesisError::InvalidConfiguration(
                "API key is required".to_string(),
            ));
        }
        if self.reference_id.trim().is_empty() {
            return Err(SynthesisError::InvalidConfiguration(
                "reference_id is required".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(SynthesisError::InvalidConfiguration(format!(
                "temperature must be within [0, 1], got {}",
                self.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(SynthesisError::InvalidConfiguration(format!(
                "top_p must be within [0, 1], got {}",
                self.top_p
            )));
        }
        if self.stream_idle_timeout.is_zero() || self.request_timeout.is_zero() {
            return Err(SynthesisError::InvalidConfiguration(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
