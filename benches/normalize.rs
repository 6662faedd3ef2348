use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use encodec_relay::audio::normalizer::{quantize, resample};
use encodec_relay::audio::wav::encode_wav;
use encodec_relay::audio::{AudioAsset, AudioNormalizer, SymphoniaDecoder};
use std::hint::black_box;

/// Ten seconds of a 440 Hz tone at the given rate and channel count.
fn tone(sample_rate: u32, channels: u16) -> Vec<i16> {
    let frames = sample_rate as usize * 10;
    (0..frames)
        .flat_map(|i| {
            let t = i as f32 / sample_rate as f32;
            let s = ((t * 440.0 * std::f32::consts::TAU).sin() * 12000.0) as i16;
            std::iter::repeat_n(s, channels as usize)
        })
        .collect()
}

fn bench_normalize(c: &mut Criterion) {
    let normalizer = AudioNormalizer::new(Box::new(SymphoniaDecoder::new()));
    let mut group = c.benchmark_group("normalize_wav_10s");
    group.sample_size(20);

    for (rate, channels) in [(24000, 1), (44100, 2), (48000, 1)] {
        let wav = encode_wav(&tone(rate, channels), rate, channels)
            .unwrap_or_else(|e| panic!("failed to synthesize fixture: {e}"));
        let asset = AudioAsset::from_bytes(wav, Some("audio/wav"));

        group.throughput(Throughput::Bytes(asset.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{rate}hz_{channels}ch")),
            &asset,
            |b, asset| b.iter(|| normalizer.normalize(black_box(asset))),
        );
    }
    group.finish();
}

fn bench_resample(c: &mut Criterion) {
    let samples: Vec<f32> = tone(44100, 1).iter().map(|&s| f32::from(s) / 32768.0).collect();

    c.bench_function("resample_44100_to_24000_10s", |b| {
        b.iter(|| resample(black_box(&samples), 44100, 24000))
    });
    c.bench_function("quantize_10s", |b| b.iter(|| quantize(black_box(&samples))));
}

criterion_group!(benches, bench_normalize, bench_resample);
criterion_main!(benches);
