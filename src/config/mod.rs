//! Configuration module for the speech pipeline
//!
//! This module handles configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable access
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use speech_pipeline::config::PipelineConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = PipelineConfig::from_env()?;
//!
//! // Load from YAML file with environment variable base
//! let config_path = PathBuf::from("config.yaml");
//! let config = PipelineConfig::from_file(&config_path)?;
//!
//! println!("Voice model {}", config.reference_id);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub mod env;
mod merge;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

use crate::core::chunker::ChunkerConfig;
use crate::core::store::MemoryStoreConfig;
use crate::core::tts::{AudioFormat, LatencyMode, SynthesisConfig};
use crate::utils::UrlValidationError;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or parsing the YAML file failed
    #[error("{0}")]
    File(String),
    #[error("Missing required setting {0}")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("Invalid endpoint: {0}")]
    Url(#[from] UrlValidationError),
}

/// Pipeline configuration
///
/// Contains everything needed to build a speech pipeline:
/// - Provider credentials and voice model
/// - Streaming and fallback endpoints and formats
/// - Transport timeouts
/// - Chunking bounds
/// - Audio cache and history limits
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    // Provider settings
    pub api_key: String,
    pub reference_id: String,
    pub ws_url: String,
    pub http_url: String,
    pub streaming_format: AudioFormat,
    pub fallback_format: AudioFormat,
    pub mp3_bitrate: u32,
    pub latency: LatencyMode,
    pub temperature: f32,
    pub top_p: f32,
    /// Accept ws:// and http:// endpoints
    pub allow_insecure_urls: bool,

    // Timeouts
    pub stream_idle_timeout_ms: u64,
    pub request_timeout_secs: u64,

    // Chunking
    pub min_chunk_length: usize,
    pub max_chunk_length: usize,

    // Cache
    pub cache_capacity: u64,
    /// Entries never expire when unset
    pub cache_ttl_seconds: Option<u64>,
    pub history_limit: usize,
}

/// Zeroize the provider key when the configuration is dropped.
impl Drop for PipelineConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        self.api_key.zeroize();
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables only
    ///
    /// # Errors
    /// Returns an error if a required variable is missing, a value cannot be
    /// parsed, or validation fails.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = merge::merge_config(None)?;
        validation::validate_all(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        // .env is loaded in main.rs at startup, so it is already part of the environment here
        let yaml_config = YamlConfig::from_file(path)?;

        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate_all(&config)?;

        Ok(config)
    }

    /// Transport settings for [`DualTransportClient`](crate::core::tts::DualTransportClient)
    pub fn synthesis_config(&self) -> SynthesisConfig {
        SynthesisConfig {
            api_key: self.api_key.clone(),
            reference_id: self.reference_id.clone(),
            ws_url: self.ws_url.clone(),
            http_url: self.http_url.clone(),
            streaming_format: self.streaming_format,
            fallback_format: self.fallback_format,
            mp3_bitrate: self.mp3_bitrate,
            latency: self.latency,
            temperature: self.temperature,
            top_p: self.top_p,
            stream_idle_timeout: Duration::from_millis(self.stream_idle_timeout_ms),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn chunker_config(&self) -> ChunkerConfig {
        ChunkerConfig {
            min_chunk_length: self.min_chunk_length,
            max_chunk_length: self.max_chunk_length,
        }
    }

    pub fn store_config(&self) -> MemoryStoreConfig {
        MemoryStoreConfig {
            capacity: self.cache_capacity,
            ttl: self.cache_ttl_seconds.map(Duration::from_secs),
            history_limit: self.history_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env as std_env;
    use std::fs;
    use tempfile::TempDir;

    // Helper to clean up environment variables
    fn cleanup_env_vars() {
        unsafe {
            for key in env::ALL_KEYS {
                std_env::remove_var(key);
            }
        }
    }

    fn set_credentials() {
        unsafe {
            std_env::set_var("FISH_API_KEY", "env-key");
            std_env::set_var("FISH_MODEL_ID", "env-model");
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        cleanup_env_vars();
        set_credentials();

        let config = PipelineConfig::from_env().unwrap();

        assert_eq!(config.api_key, "env-key");
        assert_eq!(config.reference_id, "env-model");
        assert_eq!(config.ws_url, "wss://api.fish.audio/v1/tts/live");
        assert_eq!(config.http_url, "https://api.fish.audio/v1/tts");
        assert_eq!(config.streaming_format, AudioFormat::Mp3);
        assert_eq!(config.fallback_format, AudioFormat::Mp3);
        assert_eq!(config.mp3_bitrate, 128);
        assert_eq!(config.latency, LatencyMode::Normal);
        assert_eq!(config.stream_idle_timeout_ms, 10_000);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.min_chunk_length, 50);
        assert_eq!(config.max_chunk_length, 100);
        assert_eq!(config.cache_capacity, 1024);
        assert_eq!(config.cache_ttl_seconds, None);
        assert_eq!(config.history_limit, 50);
        assert!(!config.allow_insecure_urls);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_missing_api_key() {
        cleanup_env_vars();
        unsafe {
            std_env::set_var("FISH_MODEL_ID", "env-model");
        }

        let result = PipelineConfig::from_env();
        assert!(matches!(result, Err(ConfigError::Missing("FISH_API_KEY"))));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        cleanup_env_vars();
        set_credentials();
        unsafe {
            std_env::set_var("FISH_STREAMING_FORMAT", "wav");
            std_env::set_var("FISH_LATENCY", "balanced");
            std_env::set_var("STREAM_IDLE_TIMEOUT_MS", "2500");
            std_env::set_var("CHUNK_MIN_LENGTH", "20");
            std_env::set_var("CHUNK_MAX_LENGTH", "60");
            std_env::set_var("CACHE_TTL_SECONDS", "600");
        }

        let config = PipelineConfig::from_env().unwrap();

        assert_eq!(config.streaming_format, AudioFormat::Wav);
        assert_eq!(config.latency, LatencyMode::Balanced);
        assert_eq!(
            config.synthesis_config().stream_idle_timeout,
            Duration::from_millis(2500)
        );
        let chunker = config.chunker_config();
        assert_eq!(chunker.min_chunk_length, 20);
        assert_eq!(chunker.max_chunk_length, 60);
        assert_eq!(config.store_config().ttl, Some(Duration::from_secs(600)));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_number() {
        cleanup_env_vars();
        set_credentials();
        unsafe {
            std_env::set_var("CHUNK_MAX_LENGTH", "lots");
        }

        let result = PipelineConfig::from_env();
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                key: "CHUNK_MAX_LENGTH",
                ..
            })
        ));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_insecure_urls_without_opt_in() {
        cleanup_env_vars();
        set_credentials();
        unsafe {
            std_env::set_var("FISH_WS_URL", "ws://127.0.0.1:9000/live");
        }

        assert!(matches!(
            PipelineConfig::from_env(),
            Err(ConfigError::Url(_))
        ));

        unsafe {
            std_env::set_var("FISH_ALLOW_INSECURE_URLS", "true");
        }
        let config = PipelineConfig::from_env().unwrap();
        assert_eq!(config.ws_url, "ws://127.0.0.1:9000/live");

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_only() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
provider:
  api_key: "yaml-key"
  reference_id: "yaml-model"
  fallback_format: "wav"
  temperature: 0.4

chunking:
  min_chunk_length: 30
  max_chunk_length: 90

cache:
  history_limit: 5
"#;

        fs::write(&config_path, yaml_content).unwrap();

        let config = PipelineConfig::from_file(&config_path).unwrap();

        assert_eq!(config.api_key, "yaml-key");
        assert_eq!(config.reference_id, "yaml-model");
        assert_eq!(config.fallback_format, AudioFormat::Wav);
        assert_eq!(config.temperature, 0.4);
        assert_eq!(config.min_chunk_length, 30);
        assert_eq!(config.max_chunk_length, 90);
        assert_eq!(config.history_limit, 5);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();
        set_credentials();
        unsafe {
            std_env::set_var("CHUNK_MAX_LENGTH", "70");
        }

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
provider:
  reference_id: "yaml-model"

chunking:
  max_chunk_length: 120
"#;

        fs::write(&config_path, yaml_content).unwrap();

        let config = PipelineConfig::from_file(&config_path).unwrap();

        // YAML overrides ENV
        assert_eq!(config.reference_id, "yaml-model");
        assert_eq!(config.max_chunk_length, 120);
        // ENV value
        assert_eq!(config.api_key, "env-key");

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_invalid_chunk_bounds() {
        cleanup_env_vars();
        set_credentials();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            r#"
chunking:
  min_chunk_length: 200
  max_chunk_length: 100
"#,
        )
        .unwrap();

        let result = PipelineConfig::from_file(&config_path);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("must not exceed"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_unknown_format() {
        cleanup_env_vars();
        set_credentials();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            r#"
provider:
  streaming_format: "flac"
"#,
        )
        .unwrap();

        assert!(matches!(
            PipelineConfig::from_file(&config_path),
            Err(ConfigError::Invalid {
                key: "FISH_STREAMING_FORMAT",
                ..
            })
        ));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_missing_file() {
        cleanup_env_vars();

        let config_path = PathBuf::from("/nonexistent/config.yaml");
        let result = PipelineConfig::from_file(&config_path);

        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );

        cleanup_env_vars();
    }
}
