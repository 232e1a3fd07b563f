//! Mock providers and test doubles for integration tests
//!
//! - `websocket_mock`: a scripted streaming synthesis endpoint
//! - `fakes`: in-process synthesizer and audio output doubles

// Allow dead code in test infrastructure - not every test binary uses every helper
#![allow(dead_code)]

pub mod fakes;
pub mod websocket_mock;

use bytes::Bytes;
use std::io::Cursor;

/// 16-bit mono WAV with the given samples.
pub fn wav_pcm16(samples: &[i16], sample_rate: u32) -> Bytes {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for sample in samples {
            writer.write_sample(*sample).unwrap();
        }
        writer.finalize().unwrap();
    }
    Bytes::from(cursor.into_inner())
}
