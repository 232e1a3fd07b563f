use thiserror::Error;

use crate::core::auth::AuthRequired;
use crate::core::playback::PlaybackError;
use crate::core::tts::SynthesisError;

/// Errors surfaced by a `speak` request
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    #[error("Authentication required")]
    AuthRequired,
    #[error("Nothing to speak: text is empty")]
    EmptyText,
    #[error("Synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),
    #[error("Request cancelled")]
    Cancelled,
    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),
}

impl From<AuthRequired> for PipelineError {
    fn from(_: AuthRequired) -> Self {
        PipelineError::AuthRequired
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
