//! Environment variable access for configuration loading.

use std::env;
use std::str::FromStr;

use super::ConfigError;

pub const FISH_API_KEY: &str = "FISH_API_KEY";
pub const FISH_MODEL_ID: &str = "FISH_MODEL_ID";
pub const FISH_WS_URL: &str = "FISH_WS_URL";
pub const FISH_HTTP_URL: &str = "FISH_HTTP_URL";
pub const FISH_STREAMING_FORMAT: &str = "FISH_STREAMING_FORMAT";
pub const FISH_FALLBACK_FORMAT: &str = "FISH_FALLBACK_FORMAT";
pub const FISH_MP3_BITRATE: &str = "FISH_MP3_BITRATE";
pub const FISH_LATENCY: &str = "FISH_LATENCY";
pub const FISH_TEMPERATURE: &str = "FISH_TEMPERATURE";
pub const FISH_TOP_P: &str = "FISH_TOP_P";
pub const FISH_ALLOW_INSECURE_URLS: &str = "FISH_ALLOW_INSECURE_URLS";
pub const STREAM_IDLE_TIMEOUT_MS: &str = "STREAM_IDLE_TIMEOUT_MS";
pub const FALLBACK_REQUEST_TIMEOUT_SECS: &str = "FALLBACK_REQUEST_TIMEOUT_SECS";
pub const CHUNK_MIN_LENGTH: &str = "CHUNK_MIN_LENGTH";
pub const CHUNK_MAX_LENGTH: &str = "CHUNK_MAX_LENGTH";
pub const CACHE_CAPACITY: &str = "CACHE_CAPACITY";
pub const CACHE_TTL_SECONDS: &str = "CACHE_TTL_SECONDS";
pub const HISTORY_LIMIT: &str = "HISTORY_LIMIT";

/// Every variable the loader reads.
pub const ALL_KEYS: [&str; 18] = [
    FISH_API_KEY,
    FISH_MODEL_ID,
    FISH_WS_URL,
    FISH_HTTP_URL,
    FISH_STREAMING_FORMAT,
    FISH_FALLBACK_FORMAT,
    FISH_MP3_BITRATE,
    FISH_LATENCY,
    FISH_TEMPERATURE,
    FISH_TOP_P,
    FISH_ALLOW_INSECURE_URLS,
    STREAM_IDLE_TIMEOUT_MS,
    FALLBACK_REQUEST_TIMEOUT_SECS,
    CHUNK_MIN_LENGTH,
    CHUNK_MAX_LENGTH,
    CACHE_CAPACITY,
    CACHE_TTL_SECONDS,
    HISTORY_LIMIT,
];

/// Trimmed value of `key`; unset and blank are both `None`.
pub fn var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn parse<T>(key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(key)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| ConfigError::Invalid {
                key,
                reason: format!("{raw:?}: {e}"),
            })
        })
        .transpose()
}

/// Accepts true/false, 1/0, yes/no and on/off.
pub fn parse_bool(key: &'static str) -> Result<Option<bool>, ConfigError> {
    var(key)
        .map(|raw| match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key,
                reason: format!("{raw:?} is not a boolean"),
            }),
        })
        .transpose()
}
