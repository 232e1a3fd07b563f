//! In-process doubles for the synthesizer and the audio output.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use speech_pipeline::{
    AudioOutput, PlaybackError, SpeechSynthesizer, SynthesisError, SynthesisResult,
};

#[derive(Clone)]
struct Behavior {
    delay: Duration,
    result: SynthesisResult<Bytes>,
}

/// Synthesizer with per-text scripted latency and results.
///
/// Unscripted text resolves immediately with its own bytes as "audio".
#[derive(Clone, Default)]
pub struct ScriptedSynthesizer {
    behaviors: Arc<Mutex<HashMap<String, Behavior>>>,
    calls: Arc<Mutex<Vec<String>>>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl ScriptedSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `text` with its own bytes after `delay`.
    pub fn delay(self, text: &str, delay: Duration) -> Self {
        self.respond(text, delay, Bytes::from(text.to_string()))
    }

    pub fn respond(self, text: &str, delay: Duration, audio: Bytes) -> Self {
        self.behaviors.lock().insert(
            text.to_string(),
            Behavior {
                delay,
                result: Ok(audio),
            },
        );
        self
    }

    pub fn fail(self, text: &str, delay: Duration, error: SynthesisError) -> Self {
        self.behaviors.lock().insert(
            text.to_string(),
            Behavior {
                delay,
                result: Err(error),
            },
        );
        self
    }

    /// Texts requested so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for ScriptedSynthesizer {
    async fn synthesize(&self, text: &str, _session_key: &str) -> SynthesisResult<Bytes> {
        self.calls.lock().push(text.to_string());
        let behavior = self.behaviors.lock().get(text).cloned();

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        let result = match behavior {
            Some(Behavior { delay, result }) => {
                tokio::time::sleep(delay).await;
                result
            }
            None => Ok(Bytes::from(text.to_string())),
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn get_provider_info(&self) -> &'static str {
        "scripted"
    }
}

/// Output that records what reached its natural end.
#[derive(Clone)]
pub struct RecordingOutput {
    played: Arc<Mutex<Vec<Bytes>>>,
    started: Arc<Mutex<Vec<Bytes>>>,
    duration: Duration,
}

impl RecordingOutput {
    /// Every item "plays" for `duration`.
    pub fn new(duration: Duration) -> Self {
        Self {
            played: Arc::new(Mutex::new(Vec::new())),
            started: Arc::new(Mutex::new(Vec::new())),
            duration,
        }
    }

    pub fn played(&self) -> Vec<Bytes> {
        self.played.lock().clone()
    }

    pub fn played_text(&self) -> Vec<String> {
        self.played()
            .iter()
            .map(|audio| String::from_utf8_lossy(audio).into_owned())
            .collect()
    }

    pub fn started(&self) -> Vec<Bytes> {
        self.started.lock().clone()
    }
}

#[async_trait]
impl AudioOutput for RecordingOutput {
    async fn play(&mut self, audio: Bytes) -> Result<(), PlaybackError> {
        self.started.lock().push(audio.clone());
        tokio::time::sleep(self.duration).await;
        self.played.lock().push(audio);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
