use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlaybackError {
    #[error("Playback queue is closed")]
    QueueClosed,
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("Failed to decode audio for playback: {0}")]
    DecodeFailed(String),
    #[error("Playback interrupted")]
    Interrupted,
}

/// An audio sink the playback queue drives, one item at a time.
#[async_trait]
pub trait AudioOutput: Send {
    /// Play `audio` and resolve when it reaches its natural end.
    async fn play(&mut self, audio: Bytes) -> Result<(), PlaybackError>;

    /// Silence whatever is currently sounding. Called after an in-progress
    /// `play` future has been dropped.
    async fn stop(&mut self) {}

    fn name(&self) -> &'static str {
        "output"
    }
}

#[async_trait]
impl<T: AudioOutput + ?Sized> AudioOutput for Box<T> {
    async fn play(&mut self, audio: Bytes) -> Result<(), PlaybackError> {
        (**self).play(audio).await
    }

    async fn stop(&mut self) {
        (**self).stop().await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Discards audio and completes immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOutput;

#[async_trait]
impl AudioOutput for NullOutput {
    async fn play(&mut self, _audio: Bytes) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}
