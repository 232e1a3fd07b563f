//! Synthesis scheduler.
//!
//! [`SpeechPipeline::speak`] chunks the text once, requests every segment
//! concurrently and feeds the playback queue strictly in index order:
//!
//! - segment 0 plays the moment it arrives, with its finished-observer
//!   attached before playback starts
//! - later segments wait until the request's active playback finishes, then
//!   the contiguous run of resolved segments after the last dispatched index
//!   is enqueued; a segment behind an unresolved gap keeps waiting
//! - once every call has settled, any failure fails the whole request (the
//!   lowest failing index is reported); otherwise the rest is enqueued and
//!   the audio is combined in the background
//!
//! - a newer request's `play_now` takes the queue over; an older request
//!   that lost it stops feeding the queue but still settles and combines
//!
//! All state for one request lives in a [`RequestState`] owned by that
//! request's event loop.

use bytes::Bytes;
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::auth::{AuthGate, Identity};
use crate::core::chunker::{ChunkerConfig, Segment, chunk_text};
use crate::core::combiner::{CombinationError, CombinedAsset, Combiner, SegmentResult};
use crate::core::playback::{PlaybackError, PlaybackOutcome, PlaybackQueue};
use crate::core::store::AudioStore;
use crate::core::tts::{SessionRegistry, SpeechSynthesizer, SynthesisError, SynthesisResult};
use crate::errors::{PipelineError, PipelineResult};

// =============================================================================
// Request / Outcome Types
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpeakOptions {
    /// Skip cache reads; fresh audio is still written back
    pub bypass_cache: bool,
}

/// Where the audio of a request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakSource {
    Cache,
    Synthesized,
}

pub type CombinationHandle = JoinHandle<Result<CombinedAsset, CombinationError>>;

#[derive(Debug)]
pub struct SpeakOutcome {
    pub segment_count: usize,
    pub source: SpeakSource,
    /// Background combination task, present only for multi-segment synthesis
    pub combination: Option<CombinationHandle>,
}

type SegmentFuture = BoxFuture<'static, (usize, SynthesisResult<Bytes>)>;

// =============================================================================
// Request State
// =============================================================================

struct RequestState {
    request_id: Uuid,
    results: Vec<Option<Bytes>>,
    failures: Vec<Option<SynthesisError>>,
    /// Lowest index not yet handed to the playback queue
    next_to_dispatch: usize,
    /// Items handed to the queue whose observer has not fired yet
    in_flight: usize,
    first_started: bool,
    /// Queue takeover count right after this request's first `play_now`
    takeover: u64,
    /// A newer request took over the playback queue
    superseded: bool,
}

impl RequestState {
    fn new(request_id: Uuid, segment_count: usize) -> Self {
        Self {
            request_id,
            results: vec![None; segment_count],
            failures: vec![None; segment_count],
            next_to_dispatch: 0,
            in_flight: 0,
            first_started: false,
            takeover: 0,
            superseded: false,
        }
    }

    fn settle(&mut self, index: usize, result: SynthesisResult<Bytes>) {
        match result {
            Ok(audio) => self.results[index] = Some(audio),
            Err(e) => self.failures[index] = Some(e),
        }
    }

    /// Resolved segments directly after the last dispatched index.
    fn take_contiguous(&mut self) -> Vec<(usize, Bytes)> {
        let mut ready = Vec::new();
        while let Some(Some(audio)) = self.results.get(self.next_to_dispatch) {
            ready.push((self.next_to_dispatch, audio.clone()));
            self.next_to_dispatch += 1;
        }
        ready
    }

    fn first_failure(&self) -> Option<(usize, &SynthesisError)> {
        self.failures
            .iter()
            .enumerate()
            .find_map(|(index, failure)| failure.as_ref().map(|e| (index, e)))
    }

    fn into_segment_results(self) -> Vec<SegmentResult> {
        self.results
            .into_iter()
            .enumerate()
            .filter_map(|(index, audio)| audio.map(|audio| SegmentResult::new(index, audio)))
            .collect()
    }
}

enum LoopExit {
    Settled,
    Cancelled,
    Playback(PlaybackError),
}

// =============================================================================
// Speech Pipeline
// =============================================================================

pub struct SpeechPipeline {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    playback: PlaybackQueue,
    store: Arc<dyn AudioStore>,
    auth: Arc<dyn AuthGate>,
    combiner: Combiner,
    chunker: ChunkerConfig,
    registry: SessionRegistry,
}

impl SpeechPipeline {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        playback: PlaybackQueue,
        store: Arc<dyn AudioStore>,
        auth: Arc<dyn AuthGate>,
    ) -> Self {
        Self {
            synthesizer,
            playback,
            store,
            auth,
            combiner: Combiner::new(),
            chunker: ChunkerConfig::default(),
            registry: SessionRegistry::new(),
        }
    }

    pub fn with_chunker_config(mut self, chunker: ChunkerConfig) -> Self {
        self.chunker = chunker;
        self
    }

    /// Share a registry with the transport so cancellation reaches its sessions.
    pub fn with_registry(mut self, registry: SessionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn playback(&self) -> &PlaybackQueue {
        &self.playback
    }

    pub fn store(&self) -> &Arc<dyn AudioStore> {
        &self.store
    }

    /// Cancel every in-flight request of `session_key`.
    pub fn cancel(&self, session_key: &str) -> bool {
        self.registry.cancel(session_key)
    }

    pub async fn speak(&self, text: &str, options: SpeakOptions) -> PipelineResult<SpeakOutcome> {
        let identity = self.auth.authenticate().await?;

        let segments = chunk_text(text, &self.chunker);
        let Some(first) = segments.first() else {
            return Err(PipelineError::EmptyText);
        };
        let full_text = Arc::clone(&first.full_text);
        let segment_count = segments.len();

        let request_id = Uuid::new_v4();
        let guard = self.registry.register(&identity.session_key);
        let cancel = guard.token().clone();

        info!(
            request_id = %request_id,
            user_id = %identity.user_id,
            segments = segment_count,
            chars = full_text.chars().count(),
            "Speak request"
        );

        if !options.bypass_cache
            && let Some(audio) = self.store.get_cached(&identity.session_key, &full_text).await
        {
            if let Some(handle) = self.store.has_combined(&identity.session_key, &full_text).await {
                debug!(request_id = %request_id, handle = %handle, "Serving combined asset");
            }
            info!(request_id = %request_id, bytes = audio.len(), "Serving cached audio");
            self.playback.play_now(audio)?;
            self.store
                .record_history(&identity.session_key, &full_text)
                .await;
            return Ok(SpeakOutcome {
                segment_count,
                source: SpeakSource::Cache,
                combination: None,
            });
        }

        let outcome = if segment_count == 1 {
            self.speak_single(segments, &identity, options, cancel, request_id)
                .await
        } else {
            self.speak_chunked(segments, full_text, &identity, options, cancel, request_id)
                .await
        };

        if let Err(e) = &outcome {
            match e {
                PipelineError::Cancelled => {
                    info!(request_id = %request_id, "Speak request cancelled")
                }
                other => error!(request_id = %request_id, "Speak request failed: {}", other),
            }
        }

        drop(guard);
        outcome
    }

    async fn speak_single(
        &self,
        segments: Vec<Segment>,
        identity: &Identity,
        options: SpeakOptions,
        cancel: CancellationToken,
        request_id: Uuid,
    ) -> PipelineResult<SpeakOutcome> {
        let Some(segment) = segments.into_iter().next() else {
            return Err(PipelineError::EmptyText);
        };
        let text = segment.source_text.clone();

        // The full text was already looked up, and it is this segment's text.
        let mut call = self.fetch_segment(segment, identity, options, false, cancel.clone());

        let settled = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            settled = &mut call => Some(settled),
        };

        let Some((_, result)) = settled else {
            tokio::spawn(call);
            return Err(PipelineError::Cancelled);
        };

        let audio = result?;
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        debug!(request_id = %request_id, bytes = audio.len(), "Single segment resolved");
        self.playback.play_now(audio)?;
        self.store.record_history(&identity.session_key, &text).await;

        Ok(SpeakOutcome {
            segment_count: 1,
            source: SpeakSource::Synthesized,
            combination: None,
        })
    }

    async fn speak_chunked(
        &self,
        segments: Vec<Segment>,
        full_text: Arc<str>,
        identity: &Identity,
        options: SpeakOptions,
        cancel: CancellationToken,
        request_id: Uuid,
    ) -> PipelineResult<SpeakOutcome> {
        let segment_count = segments.len();
        let mut state = RequestState::new(request_id, segment_count);

        let mut calls: FuturesUnordered<SegmentFuture> = segments
            .into_iter()
            .map(|segment| self.fetch_segment(segment, identity, options, true, cancel.clone()))
            .collect();
        let mut observers: FuturesUnordered<oneshot::Receiver<PlaybackOutcome>> =
            FuturesUnordered::new();

        let exit = loop {
            if calls.is_empty() {
                break LoopExit::Settled;
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled() => break LoopExit::Cancelled,

                Some((index, result)) = calls.next() => {
                    let resolved = result.is_ok();
                    if let Err(e) = &result {
                        warn!(
                            request_id = %state.request_id,
                            index = index,
                            "Segment synthesis failed: {}",
                            e
                        );
                    } else {
                        debug!(request_id = %state.request_id, index = index, "Segment resolved");
                    }
                    state.settle(index, result);

                    if resolved && let Err(e) = self.on_arrival(index, &mut state, &mut observers) {
                        break LoopExit::Playback(e);
                    }
                }

                Some(outcome) = observers.next(), if !observers.is_empty() => {
                    state.in_flight = state.in_flight.saturating_sub(1);
                    debug!(
                        request_id = %state.request_id,
                        outcome = ?outcome.as_ref().ok(),
                        "Segment playback ended"
                    );

                    if outcome == Ok(PlaybackOutcome::Interrupted) {
                        state.superseded = true;
                    }

                    if state.in_flight == 0
                        && let Err(e) = self.dispatch_ready(&mut state, &mut observers)
                    {
                        break LoopExit::Playback(e);
                    }
                }
            }
        };

        match exit {
            LoopExit::Settled => {}
            LoopExit::Cancelled => {
                detach(calls);
                return Err(PipelineError::Cancelled);
            }
            LoopExit::Playback(e) => {
                detach(calls);
                return Err(e.into());
            }
        }

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        if let Some((index, e)) = state.first_failure() {
            error!(
                request_id = %request_id,
                index = index,
                "Aborting request, segment could not be synthesized: {}",
                e
            );
            return Err(PipelineError::Synthesis(e.clone()));
        }

        if self.owns_playback(&mut state) {
            for (index, audio) in state.take_contiguous() {
                debug!(request_id = %request_id, index = index, "Enqueueing remaining segment");
                self.playback.enqueue(audio)?;
            }
        }

        let combination = self.spawn_combination(
            state.into_segment_results(),
            full_text,
            identity.session_key.clone(),
            request_id,
        );

        Ok(SpeakOutcome {
            segment_count,
            source: SpeakSource::Synthesized,
            combination: Some(combination),
        })
    }

    fn on_arrival(
        &self,
        index: usize,
        state: &mut RequestState,
        observers: &mut FuturesUnordered<oneshot::Receiver<PlaybackOutcome>>,
    ) -> Result<(), PlaybackError> {
        if index == 0 && !state.first_started {
            let Some(audio) = state.results[0].clone() else {
                return Ok(());
            };
            let observer = self.playback.play_now_observed(audio)?;
            state.takeover = self.playback.takeovers();
            observers.push(observer);
            state.first_started = true;
            state.next_to_dispatch = 1;
            state.in_flight += 1;
            info!(request_id = %state.request_id, "First segment playing");
            return Ok(());
        }

        if state.first_started && state.in_flight == 0 {
            self.dispatch_ready(state, observers)?;
        }
        Ok(())
    }

    fn dispatch_ready(
        &self,
        state: &mut RequestState,
        observers: &mut FuturesUnordered<oneshot::Receiver<PlaybackOutcome>>,
    ) -> Result<(), PlaybackError> {
        if !state.first_started || !self.owns_playback(state) {
            return Ok(());
        }
        for (index, audio) in state.take_contiguous() {
            let observer = self.playback.enqueue_observed(audio)?;
            observers.push(observer);
            state.in_flight += 1;
            debug!(request_id = %state.request_id, index = index, "Segment enqueued");
        }
        Ok(())
    }

    /// False once another request has called `play_now` after this one.
    fn owns_playback(&self, state: &mut RequestState) -> bool {
        if !state.superseded && self.playback.takeovers() != state.takeover {
            info!(request_id = %state.request_id, "Playback taken over by a newer request");
            state.superseded = true;
        }
        !state.superseded
    }

    fn fetch_segment(
        &self,
        segment: Segment,
        identity: &Identity,
        options: SpeakOptions,
        check_cache: bool,
        cancel: CancellationToken,
    ) -> SegmentFuture {
        let synthesizer = Arc::clone(&self.synthesizer);
        let store = Arc::clone(&self.store);
        let session_key = identity.session_key.clone();

        Box::pin(async move {
            let index = segment.index;

            if check_cache
                && !options.bypass_cache
                && let Some(audio) = store.get_cached(&session_key, &segment.source_text).await
            {
                debug!(index = index, "Segment served from cache");
                return (index, Ok(audio));
            }

            let result = synthesizer
                .synthesize(&segment.source_text, &session_key)
                .await;

            if let Ok(audio) = &result
                && !cancel.is_cancelled()
            {
                store
                    .put_cached(&session_key, &segment.source_text, audio.clone())
                    .await;
            }

            (index, result)
        })
    }

    fn spawn_combination(
        &self,
        results: Vec<SegmentResult>,
        full_text: Arc<str>,
        session_key: String,
        request_id: Uuid,
    ) -> CombinationHandle {
        let combiner = self.combiner;
        let store = Arc::clone(&self.store);

        tokio::spawn(async move {
            let combined = combiner
                .combine_and_store(
                    results,
                    Arc::clone(&full_text),
                    &session_key,
                    Arc::clone(&store),
                )
                .await;

            if let Err(e) = &combined {
                warn!(request_id = %request_id, "Combination failed: {}", e);
            }
            store.record_history(&session_key, &full_text).await;

            combined.map(|(asset, _handle)| asset)
        })
    }
}

/// Let abandoned calls run to completion in the background.
fn detach(mut calls: FuturesUnordered<SegmentFuture>) {
    if calls.is_empty() {
        return;
    }
    tokio::spawn(async move { while calls.next().await.is_some() {} });
}
