//! Endpoint URL validation
//!
//! Provider endpoints must be absolute URLs with a host and a scheme matching
//! the transport:
//! - WebSocket endpoints use `wss` (`ws` only when insecure URLs are allowed)
//! - HTTP endpoints use `https` (`http` only when insecure URLs are allowed)

use thiserror::Error;
use tracing::warn;
use url::Url;

/// Errors that can occur during URL validation
#[derive(Debug, Error)]
pub enum UrlValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("URL scheme for {kind} endpoint must be {expected}, got: {found}")]
    SchemeNotAllowed {
        kind: &'static str,
        expected: &'static str,
        found: String,
    },

    #[error("URL must have a host")]
    MissingHost,
}

/// Transport an endpoint is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    WebSocket,
    Http,
}

impl EndpointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointKind::WebSocket => "websocket",
            EndpointKind::Http => "http",
        }
    }

    fn secure_scheme(&self) -> &'static str {
        match self {
            EndpointKind::WebSocket => "wss",
            EndpointKind::Http => "https",
        }
    }

    fn insecure_scheme(&self) -> &'static str {
        match self {
            EndpointKind::WebSocket => "ws",
            EndpointKind::Http => "http",
        }
    }
}

/// Validates a provider endpoint URL
///
/// # Arguments
/// * `url` - The URL string to validate
/// * `kind` - Which transport will connect to it
/// * `allow_insecure` - Whether plain `ws`/`http` is accepted
///
/// # Example
/// ```rust
/// use speech_pipeline::utils::url_validation::{EndpointKind, validate_endpoint_url};
///
/// let live = "wss://api.fish.audio/v1/tts/live";
/// assert!(validate_endpoint_url(live, EndpointKind::WebSocket, false).is_ok());
/// assert!(validate_endpoint_url("ws://127.0.0.1:9000", EndpointKind::WebSocket, false).is_err());
/// assert!(validate_endpoint_url("ws://127.0.0.1:9000", EndpointKind::WebSocket, true).is_ok());
/// ```
pub fn validate_endpoint_url(
    url: &str,
    kind: EndpointKind,
    allow_insecure: bool,
) -> Result<Url, UrlValidationError> {
    let parsed = Url::parse(url)?;

    let scheme = parsed.scheme();
    let secure = scheme == kind.secure_scheme();
    let insecure = scheme == kind.insecure_scheme();

    if !secure && !(insecure && allow_insecure) {
        return Err(UrlValidationError::SchemeNotAllowed {
            kind: kind.as_str(),
            expected: if allow_insecure {
                match kind {
                    EndpointKind::WebSocket => "wss or ws",
                    EndpointKind::Http => "https or http",
                }
            } else {
                kind.secure_scheme()
            },
            found: scheme.to_string(),
        });
    }

    match parsed.host_str() {
        Some(host) if !host.is_empty() => {
            if insecure {
                warn!(host = %host, kind = kind.as_str(), "Using insecure provider endpoint");
            }
        }
        _ => return Err(UrlValidationError::MissingHost),
    }

    Ok(parsed)
}
