//! Performance benchmarks for offset estimation

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rendition_sync::features::extractor::{extract_features, ExtractionParams};
use rendition_sync::{
    align, AlignmentConfig, AudioBuffer, ConsensusStrategy, FeatureCache, FeatureType,
};

/// Decaying tone bursts every ~0.3 s with a slowly changing pitch
fn synth(seconds: usize) -> Vec<f32> {
    (0..44100 * seconds)
        .map(|i| {
            let burst = i % 13_230;
            let freq = 220.0 * (1.0 + ((i / 13_230) % 12) as f32 / 12.0);
            let env = (-(burst as f32) / 3_500.0).exp();
            env * (2.0 * std::f32::consts::PI * freq * i as f32 / 44100.0).sin() * 0.5
        })
        .collect()
}

fn bench_align(c: &mut Criterion) {
    // 30 seconds at 44.1kHz, rendition delayed by 20 frames of 512
    let samples = synth(30);
    let delayed: Vec<f32> = std::iter::repeat(0.0)
        .take(20 * 512)
        .chain(samples.iter().copied())
        .take(samples.len())
        .collect();
    let reference = AudioBuffer::new(samples, 44100).with_id("reference");
    let rendition = AudioBuffer::new(delayed, 44100).with_id("rendition");

    let config = AlignmentConfig::default();
    c.bench_function("align_global_30s", |b| {
        b.iter(|| {
            let _ = align(black_box(&reference), black_box(&rendition), black_box(&config));
        });
    });

    let windowed = AlignmentConfig {
        consensus: ConsensusStrategy::WindowedClusters,
        ..Default::default()
    };
    c.bench_function("align_windowed_30s", |b| {
        b.iter(|| {
            let _ = align(black_box(&reference), black_box(&rendition), black_box(&windowed));
        });
    });
}

fn bench_feature_extraction(c: &mut Criterion) {
    let samples = synth(30);
    let params = ExtractionParams {
        sample_rate: 44100,
        frame_length: 2048,
        hop_lengths: vec![256, 512, 1024],
        features: FeatureType::ALL.to_vec(),
    };

    c.bench_function("extract_features_30s", |b| {
        b.iter(|| {
            let mut cache = FeatureCache::new();
            let _ = extract_features(&mut cache, black_box(&[&samples[..]]), black_box(&params));
        });
    });
}

criterion_group!(benches, bench_align, bench_feature_extraction);
criterion_main!(benches);
