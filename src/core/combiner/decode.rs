//! Decoding encoded segment audio into planar `f32` sample buffers.
//!
//! WAV goes through `hound`; everything else is probed and decoded with
//! `symphonia`. Integer PCM is scaled by `2^(bits-1)` so that 16-bit input
//! survives a decode/encode round trip unchanged.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decoded audio, one sample vector per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl DecodedAudio {
    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }

    pub fn frame_count(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Split interleaved samples into per-channel buffers.
    pub fn from_interleaved(samples: &[f32], sample_rate: u32, channel_count: usize) -> Self {
        let channel_count = channel_count.max(1);
        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (channel, sample) in channels.iter_mut().zip(frame) {
                channel.push(*sample);
            }
        }
        Self {
            sample_rate,
            channels,
        }
    }
}

fn is_wav(data: &[u8]) -> bool {
    data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WAVE"
}

/// Decode one encoded audio payload.
pub fn decode_audio(data: &[u8]) -> Result<DecodedAudio, String> {
    if data.is_empty() {
        return Err("empty audio payload".to_string());
    }
    if is_wav(data) {
        return decode_wav(data);
    }
    decode_compressed(data)
}

fn decode_wav(data: &[u8]) -> Result<DecodedAudio, String> {
    let mut reader = hound::WavReader::new(Cursor::new(data)).map_err(|e| e.to_string())?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => match spec.bits_per_sample {
            bits @ 1..=32 => {
                let scale = (1i64 << (bits - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()
                    .map_err(|e| e.to_string())?
            }
            bits => return Err(format!("unsupported bit depth: {bits}")),
        },
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| e.to_string())?,
    };

    Ok(DecodedAudio::from_interleaved(
        &samples,
        spec.sample_rate,
        spec.channels as usize,
    ))
}

fn decode_compressed(data: &[u8]) -> Result<DecodedAudio, String> {
    let source = Cursor::new(data.to_vec());
    let mss = MediaSourceStream::new(Box::new(source), MediaSourceStreamOptions::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| e.to_string())?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| "no audio track found".to_string())?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| "unknown sample rate".to_string())?;
    let mut channel_count = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| e.to_string())?;

    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(_)) | Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.to_string()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                if channel_count == 0 {
                    channel_count = decoded.spec().channels.count();
                }
                let sb = sample_buf.get_or_insert_with(|| {
                    SampleBuffer::new(decoded.capacity() as u64, *decoded.spec())
                });
                sb.copy_interleaved_ref(decoded);
                samples.extend_from_slice(sb.samples());
            }
            Err(SymphoniaError::IoError(_)) | Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(e.to_string()),
        }
    }

    if samples.is_empty() {
        return Err("no samples decoded".to_string());
    }

    Ok(DecodedAudio::from_interleaved(
        &samples,
        sample_rate,
        channel_count.max(1),
    ))
}
