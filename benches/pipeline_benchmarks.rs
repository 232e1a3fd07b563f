//! Performance benchmarks for the speech pipeline
//!
//! Run with: cargo bench
//! Or for specific benchmarks: cargo bench -- <filter>

use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::io::Cursor;
use std::time::Duration;
use speech_pipeline::core::tts::messages::decode_frame;
use speech_pipeline::{ChunkerConfig, Combiner, SegmentResult, chunk_text};

const PARAGRAPH: &str = "The quick brown fox jumps over the lazy dog. Pack my box with five dozen liquor jugs! \
How vexingly quick daft zebras jump? Sphinx of black quartz, judge my vow. ";

/// Benchmark sentence chunking across input sizes
fn bench_chunking(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunking");
    group.measurement_time(Duration::from_secs(5));
    let config = ChunkerConfig::default();

    for repeats in [1usize, 10, 100] {
        let text = PARAGRAPH.repeat(repeats);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("chunk_text", text.len()), &text, |b, text| {
            b.iter(|| chunk_text(black_box(text), &config));
        });
    }

    group.finish();
}

#[derive(serde::Serialize)]
struct AudioFrame {
    event: &'static str,
    #[serde(with = "serde_bytes")]
    audio: Vec<u8>,
}

/// Benchmark the incoming frame decoder chain, one frame per tier
fn bench_frame_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decoding");
    let audio = vec![0x55u8; 4096];

    let msgpack = Bytes::from(
        rmp_serde::to_vec_named(&AudioFrame {
            event: "audio",
            audio: audio.clone(),
        })
        .unwrap(),
    );
    let json = Bytes::from(
        serde_json::json!({
            "event": "audio",
            "audio": base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &audio),
        })
        .to_string(),
    );
    let mut raw = vec![0xFF, 0xF3];
    raw.extend_from_slice(&audio);
    let raw = Bytes::from(raw);

    for (name, frame) in [("msgpack", &msgpack), ("json", &json), ("raw", &raw)] {
        group.throughput(Throughput::Bytes(frame.len() as u64));
        group.bench_with_input(BenchmarkId::new(name, frame.len()), frame, |b, frame| {
            b.iter(|| decode_frame(black_box(frame)));
        });
    }

    group.finish();
}

fn wav_segment(frames: usize, sample_rate: u32) -> Bytes {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..frames {
            writer.write_sample(((i % 200) as i16 - 100) * 100).unwrap();
        }
        writer.finalize().unwrap();
    }
    Bytes::from(cursor.into_inner())
}

/// Benchmark decode-concatenate-encode for typical request sizes
fn bench_combining(c: &mut Criterion) {
    let mut group = c.benchmark_group("combining");
    group.measurement_time(Duration::from_secs(5));
    let combiner = Combiner::new();

    // One second of 24 kHz audio per segment
    let segment = wav_segment(24_000, 24_000);

    for count in [2usize, 8] {
        group.bench_with_input(BenchmarkId::new("wav_segments", count), &count, |b, &count| {
            b.iter(|| {
                let mut results: Vec<SegmentResult> = (0..count)
                    .map(|index| SegmentResult::new(index, segment.clone()))
                    .collect();
                combiner.combine(black_box(&mut results), "benchmark").unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_chunking, bench_frame_decoding, bench_combining);
criterion_main!(benches);
