use bytes::Bytes;
use std::io::Cursor;

use super::decode::DecodedAudio;

/// Convert a normalized sample to 16-bit PCM.
#[inline]
pub fn quantize_i16(sample: f32) -> i16 {
    (sample * 32768.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Encode planar audio as an interleaved 16-bit PCM WAV file.
pub fn encode_wav_pcm16(audio: &DecodedAudio) -> Result<Bytes, hound::Error> {
    let spec = hound::WavSpec {
        channels: audio.channel_count(),
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let frames = audio.frame_count();
    let mut cursor = Cursor::new(Vec::with_capacity(44 + frames * audio.channels.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        let mut pcm = writer.get_i16_writer((frames * audio.channels.len()) as u32);
        for frame in 0..frames {
            for channel in &audio.channels {
                pcm.write_sample(quantize_i16(channel[frame]));
            }
        }
        pcm.flush()?;
        writer.finalize()?;
    }

    Ok(Bytes::from(cursor.into_inner()))
}
