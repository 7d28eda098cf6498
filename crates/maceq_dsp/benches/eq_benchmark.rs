//! Performance benchmarks for the DSP nodes
//!
//! Run with: cargo bench -p maceq_dsp

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use maceq_dsp::{AudioFormat, EqParameters, EqUnit, Mixer, Preset};

fn benchmark_eq_processing(c: &mut Criterion) {
    let mut group = c.benchmark_group("equalizer");

    // Common hardware buffer sizes
    let buffer_sizes = [64, 128, 256, 512, 1024, 2048];

    for size in buffer_sizes {
        let sample_count = size * 2;

        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("process_interleaved_{}_frames", size), |b| {
            let mut eq = EqUnit::new(48000.0, 2).unwrap();
            for (band, gain) in Preset::Vocal.gains().into_iter().enumerate() {
                eq.set_band_gain(band, gain).unwrap();
            }
            let mut buffer: Vec<f32> = (0..sample_count)
                .map(|i| (i as f32 * 0.001).sin())
                .collect();

            b.iter(|| {
                eq.process_interleaved(black_box(&mut buffer));
            });
        });
    }

    group.finish();
}

fn benchmark_parameter_sync(c: &mut Criterion) {
    c.bench_function("eq_sync_changed_band", |b| {
        let mut eq = EqUnit::new(48000.0, 2).unwrap();
        let params = EqParameters::new();
        let mut band = 0;
        let mut gain = -12.0_f32;

        b.iter(|| {
            // A slider drag: one write, then the next callback picks it up
            params.set_band_gain(band, gain).unwrap();
            eq.sync(black_box(&params));
            band = (band + 1) % 10;
            gain = if gain >= 12.0 { -12.0 } else { gain + 1.0 };
        });
    });

    c.bench_function("eq_sync_unchanged", |b| {
        let mut eq = EqUnit::new(48000.0, 2).unwrap();
        let params = EqParameters::new();
        eq.sync(&params);

        b.iter(|| {
            eq.sync(black_box(&params));
        });
    });
}

fn benchmark_mixer(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixer");
    let frames = 512;
    group.throughput(Throughput::Elements(frames as u64));

    let cases = [
        ("passthrough", AudioFormat::new(48000, 2), AudioFormat::new(48000, 2)),
        ("44k1_mono_to_48k_stereo", AudioFormat::new(44100, 1), AudioFormat::new(48000, 2)),
    ];

    for (name, input, output) in cases {
        group.bench_function(name, |b| {
            let mut mixer = Mixer::new(input, output);
            let mut out = vec![0.0_f32; frames * output.channels as usize];
            let mut phase = 0.0_f32;

            b.iter(|| {
                mixer.render(black_box(&mut out), |frame| {
                    phase += 0.01;
                    frame.fill(phase.sin());
                    true
                });
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_eq_processing,
    benchmark_parameter_sync,
    benchmark_mixer
);

criterion_main!(benches);
