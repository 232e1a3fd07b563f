//! Single-shot HTTP synthesis, used when the streaming session fails.
//!
//! - Endpoint: `POST {http_url}` with `Authorization: Bearer <key>`
//! - Body: `{ text, reference_id, format, mp3_bitrate }`
//! - Response: the complete encoded audio

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, error};

use super::base::{SynthesisError, SynthesisResult};
use super::config::SynthesisConfig;

#[derive(Debug, Serialize)]
struct FallbackRequest<'a> {
    text: &'a str,
    reference_id: &'a str,
    format: &'static str,
    mp3_bitrate: u32,
}

#[derive(Clone)]
pub struct FallbackClient {
    client: reqwest::Client,
}

impl FallbackClient {
    pub fn new(config: &SynthesisConfig) -> SynthesisResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                SynthesisError::InvalidConfiguration(format!("Failed to build HTTP client: {e}"))
            })?;
        Ok(Self { client })
    }

    pub async fn synthesize(&self, config: &SynthesisConfig, text: &str) -> SynthesisResult<Bytes> {
        let body = FallbackRequest {
            text,
            reference_id: &config.reference_id,
            format: config.fallback_format.as_str(),
            mp3_bitrate: config.mp3_bitrate,
        };

        let response = self
            .client
            .post(&config.http_url)
            .header("Authorization", format!("Bearer {}", config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    SynthesisError::ConnectionFailed(format!("Fallback request failed: {e}"))
                } else {
                    SynthesisError::NetworkError(format!("Fallback request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Fallback synthesis rejected: {}", body);
            return Err(SynthesisError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        let audio = response.bytes().await.map_err(|e| {
            SynthesisError::NetworkError(format!("Failed to read fallback audio: {e}"))
        })?;

        if audio.is_empty() {
            return Err(SynthesisError::NoAudio);
        }

        debug!(bytes = audio.len(), "Fallback synthesis complete");
        Ok(audio)
    }
}
