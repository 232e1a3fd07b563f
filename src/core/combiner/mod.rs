//! Lossless combination of segment audio into one asset.
//!
//! Every segment is decoded to planar samples, the buffers are concatenated
//! in index order channel by channel, and the result is re-encoded as 16-bit
//! PCM WAV. The first segment fixes the sample rate and channel count; any
//! segment that disagrees fails the combination.

mod decode;
mod encode;

pub use decode::{DecodedAudio, decode_audio};
pub use encode::{encode_wav_pcm16, quantize_i16};

use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::core::store::{AudioStore, CombinedHandle};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CombinationError {
    #[error("No segments to combine")]
    NoSegments,
    #[error("Segments are not in index order at position {position} (found index {index})")]
    OutOfOrder { position: usize, index: usize },
    #[error("Failed to decode segment {index}: {reason}")]
    DecodeFailed { index: usize, reason: String },
    #[error(
        "Segment {index} is {found_rate} Hz/{found_channels} ch, expected {expected_rate} Hz/{expected_channels} ch"
    )]
    FormatMismatch {
        index: usize,
        expected_rate: u32,
        expected_channels: u16,
        found_rate: u32,
        found_channels: u16,
    },
    #[error("Failed to encode combined audio: {0}")]
    EncodeFailed(String),
    #[error("Failed to store combined audio: {0}")]
    StoreFailed(String),
    #[error("Combination task failed: {0}")]
    TaskFailed(String),
}

/// Audio for one segment, as delivered by the transport.
#[derive(Debug, Clone)]
pub struct SegmentResult {
    pub index: usize,
    pub audio: Bytes,
    /// Filled in during combination
    pub decoded: Option<DecodedAudio>,
}

impl SegmentResult {
    pub fn new(index: usize, audio: Bytes) -> Self {
        Self {
            index,
            audio,
            decoded: None,
        }
    }
}

/// The single re-encoded asset for a whole request.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedAsset {
    pub source_text: String,
    pub sample_rate: u32,
    pub channel_count: u16,
    pub frame_count: usize,
    pub encoded_bytes: Bytes,
}

impl CombinedAsset {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count as f64 / self.sample_rate as f64
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Combiner;

impl Combiner {
    pub fn new() -> Self {
        Self
    }

    /// Decode, concatenate and re-encode `results`, which must be in index order.
    pub fn combine(
        &self,
        results: &mut [SegmentResult],
        original_text: &str,
    ) -> Result<CombinedAsset, CombinationError> {
        if results.is_empty() {
            return Err(CombinationError::NoSegments);
        }

        for (position, result) in results.iter().enumerate() {
            if result.index != position {
                return Err(CombinationError::OutOfOrder {
                    position,
                    index: result.index,
                });
            }
        }

        for result in results.iter_mut() {
            if result.decoded.is_none() {
                let decoded = decode_audio(&result.audio).map_err(|reason| {
                    CombinationError::DecodeFailed {
                        index: result.index,
                        reason,
                    }
                })?;
                result.decoded = Some(decoded);
            }
        }

        let decoded: Vec<&DecodedAudio> =
            results.iter().filter_map(|r| r.decoded.as_ref()).collect();
        let first = decoded[0];
        let sample_rate = first.sample_rate;
        let channel_count = first.channel_count();

        for (index, segment) in decoded.iter().enumerate().skip(1) {
            if segment.sample_rate != sample_rate || segment.channel_count() != channel_count {
                return Err(CombinationError::FormatMismatch {
                    index,
                    expected_rate: sample_rate,
                    expected_channels: channel_count,
                    found_rate: segment.sample_rate,
                    found_channels: segment.channel_count(),
                });
            }
        }

        let frame_count: usize = decoded.iter().map(|d| d.frame_count()).sum();

        let mut channels: Vec<Vec<f32>> = (0..channel_count)
            .map(|_| Vec::with_capacity(frame_count))
            .collect();
        for segment in &decoded {
            for (target, source) in channels.iter_mut().zip(&segment.channels) {
                target.extend_from_slice(source);
            }
        }

        let combined = DecodedAudio {
            sample_rate,
            channels,
        };
        let encoded_bytes = encode_wav_pcm16(&combined)
            .map_err(|e| CombinationError::EncodeFailed(e.to_string()))?;

        debug!(
            segments = results.len(),
            frames = frame_count,
            sample_rate = sample_rate,
            channels = channel_count,
            "Combined segment audio"
        );

        Ok(CombinedAsset {
            source_text: original_text.to_string(),
            sample_rate,
            channel_count,
            frame_count,
            encoded_bytes,
        })
    }

    /// Combine on the blocking pool, then hand the asset to `store`.
    pub async fn combine_and_store(
        &self,
        mut results: Vec<SegmentResult>,
        original_text: Arc<str>,
        session_key: &str,
        store: Arc<dyn AudioStore>,
    ) -> Result<(CombinedAsset, CombinedHandle), CombinationError> {
        let combiner = *self;
        let text = Arc::clone(&original_text);
        let asset = tokio::task::spawn_blocking(move || combiner.combine(&mut results, &text))
            .await
            .map_err(|e| CombinationError::TaskFailed(e.to_string()))??;

        let handle = store
            .put_combined(session_key, &original_text, &asset)
            .await
            .map_err(|e| CombinationError::StoreFailed(e.to_string()))?;

        info!(
            handle = %handle,
            bytes = asset.encoded_bytes.len(),
            duration_secs = asset.duration_secs(),
            "Stored combined audio"
        );
        Ok((asset, handle))
    }
}
