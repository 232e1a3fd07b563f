use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

/// Errors that can end a synthesis call
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SynthesisError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("No audio data received")]
    NoAudio,
    #[error("Streaming session idle for {0:?}")]
    Timeout(Duration),
    #[error("Synthesis cancelled")]
    Cancelled,
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("Upstream returned status {status}: {body}")]
    UpstreamStatus { status: u16, body: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Failed to encode request: {0}")]
    EncodingError(String),
}

impl SynthesisError {
    /// Whether the streaming path should give way to the fallback path.
    pub fn triggers_fallback(&self) -> bool {
        !matches!(
            self,
            SynthesisError::Cancelled | SynthesisError::InvalidConfiguration(_)
        )
    }
}

pub type SynthesisResult<T> = Result<T, SynthesisError>;

/// Turns one segment of text into encoded audio bytes.
///
/// `session_key` scopes the call for out-of-band cancellation; implementations
/// that cannot be cancelled may ignore it.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, session_key: &str) -> SynthesisResult<Bytes>;

    fn get_provider_info(&self) -> &'static str {
        "unknown"
    }
}
