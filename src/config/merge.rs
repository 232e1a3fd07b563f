//! Merging YAML overrides onto environment values and defaults.

use std::str::FromStr;

use super::env::{self, *};
use super::yaml::{CacheYaml, ChunkingYaml, ProviderYaml, TimeoutsYaml, YamlConfig};
use super::{ConfigError, PipelineConfig};
use crate::core::chunker::{DEFAULT_MAX_CHUNK_LENGTH, DEFAULT_MIN_CHUNK_LENGTH};
use crate::core::store::{DEFAULT_CACHE_CAPACITY, DEFAULT_HISTORY_LIMIT};
use crate::core::tts::{
    AudioFormat, DEFAULT_MP3_BITRATE, DEFAULT_REQUEST_TIMEOUT, DEFAULT_STREAM_IDLE_TIMEOUT,
    DEFAULT_TEMPERATURE, DEFAULT_TOP_P, FISH_TTS_HTTP_URL, FISH_TTS_WS_URL, LatencyMode,
};

/// Build a [`PipelineConfig`] from the environment with `yaml` taking precedence.
pub fn merge_config(yaml: Option<YamlConfig>) -> Result<PipelineConfig, ConfigError> {
    let yaml = yaml.unwrap_or_default();
    let provider = yaml.provider.unwrap_or_default();
    let timeouts = yaml.timeouts.unwrap_or_default();
    let chunking = yaml.chunking.unwrap_or_default();
    let cache = yaml.cache.unwrap_or_default();

    let ProviderYaml {
        api_key,
        reference_id,
        ws_url,
        http_url,
        streaming_format,
        fallback_format,
        mp3_bitrate,
        latency,
        temperature,
        top_p,
        allow_insecure_urls,
    } = provider;
    let TimeoutsYaml {
        stream_idle_ms,
        request_secs,
    } = timeouts;
    let ChunkingYaml {
        min_chunk_length,
        max_chunk_length,
    } = chunking;
    let CacheYaml {
        capacity,
        ttl_seconds,
        history_limit,
    } = cache;

    let api_key = non_empty(api_key)
        .or_else(|| env::var(FISH_API_KEY))
        .ok_or(ConfigError::Missing(FISH_API_KEY))?;
    let reference_id = non_empty(reference_id)
        .or_else(|| env::var(FISH_MODEL_ID))
        .ok_or(ConfigError::Missing(FISH_MODEL_ID))?;

    Ok(PipelineConfig {
        api_key,
        reference_id,
        ws_url: non_empty(ws_url)
            .or_else(|| env::var(FISH_WS_URL))
            .unwrap_or_else(|| FISH_TTS_WS_URL.to_string()),
        http_url: non_empty(http_url)
            .or_else(|| env::var(FISH_HTTP_URL))
            .unwrap_or_else(|| FISH_TTS_HTTP_URL.to_string()),
        streaming_format: parse_choice::<AudioFormat>(streaming_format, FISH_STREAMING_FORMAT)?
            .unwrap_or(AudioFormat::Mp3),
        fallback_format: parse_choice::<AudioFormat>(fallback_format, FISH_FALLBACK_FORMAT)?
            .unwrap_or(AudioFormat::Mp3),
        mp3_bitrate: pick(mp3_bitrate, FISH_MP3_BITRATE)?.unwrap_or(DEFAULT_MP3_BITRATE),
        latency: parse_choice::<LatencyMode>(latency, FISH_LATENCY)?
            .unwrap_or(LatencyMode::Normal),
        temperature: pick(temperature, FISH_TEMPERATURE)?.unwrap_or(DEFAULT_TEMPERATURE),
        top_p: pick(top_p, FISH_TOP_P)?.unwrap_or(DEFAULT_TOP_P),
        allow_insecure_urls: match allow_insecure_urls {
            Some(value) => value,
            None => env::parse_bool(FISH_ALLOW_INSECURE_URLS)?.unwrap_or(false),
        },
        stream_idle_timeout_ms: pick(stream_idle_ms, STREAM_IDLE_TIMEOUT_MS)?
            .unwrap_or(DEFAULT_STREAM_IDLE_TIMEOUT.as_millis() as u64),
        request_timeout_secs: pick(request_secs, FALLBACK_REQUEST_TIMEOUT_SECS)?
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT.as_secs()),
        min_chunk_length: pick(min_chunk_length, CHUNK_MIN_LENGTH)?
            .unwrap_or(DEFAULT_MIN_CHUNK_LENGTH),
        max_chunk_length: pick(max_chunk_length, CHUNK_MAX_LENGTH)?
            .unwrap_or(DEFAULT_MAX_CHUNK_LENGTH),
        cache_capacity: pick(capacity, CACHE_CAPACITY)?.unwrap_or(DEFAULT_CACHE_CAPACITY),
        cache_ttl_seconds: pick(ttl_seconds, CACHE_TTL_SECONDS)?,
        history_limit: pick(history_limit, HISTORY_LIMIT)?.unwrap_or(DEFAULT_HISTORY_LIMIT),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// YAML value if present, otherwise the parsed environment variable.
fn pick<T>(yaml: Option<T>, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match yaml {
        Some(value) => Ok(Some(value)),
        None => env::parse(key),
    }
}

fn parse_choice<T>(yaml: Option<String>, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr<Err = String>,
{
    match non_empty(yaml) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|reason| ConfigError::Invalid { key, reason }),
        None => env::parse(key),
    }
}
