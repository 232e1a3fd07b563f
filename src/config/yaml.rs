use serde::Deserialize;
use std::path::PathBuf;

use super::ConfigError;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present here
/// override the environment.
///
/// # Example YAML structure
/// ```yaml
/// provider:
///   api_key: "your-fish-audio-key"
///   reference_id: "voice-model-id"
///   ws_url: "wss://api.fish.audio/v1/tts/live"
///   http_url: "https://api.fish.audio/v1/tts"
///   streaming_format: "mp3"
///   fallback_format: "mp3"
///   mp3_bitrate: 128
///   latency: "normal"
///   temperature: 0.7
///   top_p: 0.7
///   allow_insecure_urls: false
///
/// timeouts:
///   stream_idle_ms: 10000
///   request_secs: 30
///
/// chunking:
///   min_chunk_length: 50
///   max_chunk_length: 100
///
/// cache:
///   capacity: 1024
///   ttl_seconds: 3600
///   history_limit: 50
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub provider: Option<ProviderYaml>,
    pub timeouts: Option<TimeoutsYaml>,
    pub chunking: Option<ChunkingYaml>,
    pub cache: Option<CacheYaml>,
}

/// Synthesis provider settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProviderYaml {
    pub api_key: Option<String>,
    /// Voice model identifier
    pub reference_id: Option<String>,
    pub ws_url: Option<String>,
    pub http_url: Option<String>,
    pub streaming_format: Option<String>,
    pub fallback_format: Option<String>,
    pub mp3_bitrate: Option<u32>,
    /// "normal" or "balanced"
    pub latency: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    /// Accept ws:// and http:// endpoints (local development)
    pub allow_insecure_urls: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TimeoutsYaml {
    pub stream_idle_ms: Option<u64>,
    pub request_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ChunkingYaml {
    pub min_chunk_length: Option<usize>,
    pub max_chunk_length: Option<usize>,
}

/// Audio cache and history settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CacheYaml {
    pub capacity: Option<u64>,
    pub ttl_seconds: Option<u64>,
    pub history_limit: Option<usize>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::File(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| ConfigError::File(format!("Failed to parse YAML config: {e}")))?;

        Ok(config)
    }
}
