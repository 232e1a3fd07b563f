//! Dual-transport synthesis client.
//!
//! Tries a streaming session first and falls back to a single HTTP call when
//! the session fails for any reason other than cancellation.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{info, warn};

use super::base::{SpeechSynthesizer, SynthesisResult};
use super::config::SynthesisConfig;
use super::fallback::FallbackClient;
use super::registry::SessionRegistry;
use super::streaming::stream_synthesis;

/// Which path produced the audio of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportPath {
    Streaming,
    Fallback,
}

impl TransportPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Streaming => "streaming",
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Clone)]
pub struct DualTransportClient {
    config: Arc<SynthesisConfig>,
    fallback: FallbackClient,
    registry: SessionRegistry,
}

impl DualTransportClient {
    pub fn new(config: SynthesisConfig, registry: SessionRegistry) -> SynthesisResult<Self> {
        config.validate()?;
        let fallback = FallbackClient::new(&config)?;
        Ok(Self {
            config: Arc::new(config),
            fallback,
            registry,
        })
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Synthesize `text`, reporting which transport produced the audio.
    pub async fn synthesize_with_path(
        &self,
        text: &str,
        session_key: &str,
    ) -> SynthesisResult<(Bytes, TransportPath)> {
        let guard = self.registry.register(session_key);

        let streaming_error = match stream_synthesis(&self.config, text, guard.token()).await {
            Ok(audio) => return Ok((audio, TransportPath::Streaming)),
            Err(e) => e,
        };

        if !streaming_error.triggers_fallback() || guard.is_cancelled() {
            return Err(streaming_error);
        }

        warn!(
            session_key = %session_key,
            "Streaming synthesis failed, falling back to HTTP: {}",
            streaming_error
        );
        drop(guard);

        let audio = self.fallback.synthesize(&self.config, text).await?;
        info!(bytes = audio.len(), "Fallback synthesis successful");
        Ok((audio, TransportPath::Fallback))
    }

    pub async fn synthesize_streaming(
        &self,
        text: &str,
        session_key: &str,
    ) -> SynthesisResult<Bytes> {
        let guard = self.registry.register(session_key);
        stream_synthesis(&self.config, text, guard.token()).await
    }

    pub async fn synthesize_fallback(&self, text: &str) -> SynthesisResult<Bytes> {
        self.fallback.synthesize(&self.config, text).await
    }
}

#[async_trait]
impl SpeechSynthesizer for DualTransportClient {
    async fn synthesize(&self, text: &str, session_key: &str) -> SynthesisResult<Bytes> {
        self.synthesize_with_path(text, session_key)
            .await
            .map(|(audio, _path)| audio)
    }

    fn get_provider_info(&self) -> &'static str {
        "Fish Audio (streaming + HTTP fallback)"
    }
}
