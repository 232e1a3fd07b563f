//! Configuration validation logic.

use super::{ConfigError, PipelineConfig};
use crate::utils::url_validation::{EndpointKind, validate_endpoint_url};

pub fn validate_credentials(api_key: &str, reference_id: &str) -> Result<(), ConfigError> {
    if api_key.trim().is_empty() {
        return Err(ConfigError::Missing(super::env::FISH_API_KEY));
    }
    if reference_id.trim().is_empty() {
        return Err(ConfigError::Missing(super::env::FISH_MODEL_ID));
    }
    Ok(())
}

pub fn validate_endpoints(
    ws_url: &str,
    http_url: &str,
    allow_insecure: bool,
) -> Result<(), ConfigError> {
    validate_endpoint_url(ws_url, EndpointKind::WebSocket, allow_insecure)?;
    validate_endpoint_url(http_url, EndpointKind::Http, allow_insecure)?;
    Ok(())
}

pub fn validate_sampling(temperature: f32, top_p: f32) -> Result<(), ConfigError> {
    for (key, value) in [("temperature", temperature), ("top_p", top_p)] {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::Invalid {
                key,
                reason: format!("must be within [0, 1], got {value}"),
            });
        }
    }
    Ok(())
}

pub fn validate_chunking(min: usize, max: usize) -> Result<(), ConfigError> {
    if min == 0 {
        return Err(ConfigError::Invalid {
            key: "min_chunk_length",
            reason: "must be greater than zero".to_string(),
        });
    }
    if min > max {
        return Err(ConfigError::Invalid {
            key: "min_chunk_length",
            reason: format!("{min} must not exceed max_chunk_length {max}"),
        });
    }
    Ok(())
}

pub fn validate_timeouts(stream_idle_ms: u64, request_secs: u64) -> Result<(), ConfigError> {
    if stream_idle_ms == 0 {
        return Err(ConfigError::Invalid {
            key: "stream_idle_ms",
            reason: "must be greater than zero".to_string(),
        });
    }
    if request_secs == 0 {
        return Err(ConfigError::Invalid {
            key: "request_secs",
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}

pub fn validate_cache(capacity: u64, history_limit: usize) -> Result<(), ConfigError> {
    if capacity == 0 {
        return Err(ConfigError::Invalid {
            key: "cache.capacity",
            reason: "must be greater than zero".to_string(),
        });
    }
    if history_limit == 0 {
        return Err(ConfigError::Invalid {
            key: "cache.history_limit",
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}

pub fn validate_all(config: &PipelineConfig) -> Result<(), ConfigError> {
    validate_credentials(&config.api_key, &config.reference_id)?;
    validate_endpoints(&config.ws_url, &config.http_url, config.allow_insecure_urls)?;
    validate_sampling(config.temperature, config.top_p)?;
    validate_chunking(config.min_chunk_length, config.max_chunk_length)?;
    validate_timeouts(config.stream_idle_timeout_ms, config.request_timeout_secs)?;
    validate_cache(config.cache_capacity, config.history_limit)?;
    Ok(())
}
