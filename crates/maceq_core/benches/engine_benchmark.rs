//! Audio engine benchmarks
//!
//! Measures performance of the output-callback processing path.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use maceq_core::{AudioFormat, DeviceCatalog, GraphProcessor, Preset, SharedState};
use maceq_platform::SimulatedHardware;

fn benchmark_processor(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_processor");

    let cases = [
        ("48k_stereo", AudioFormat::new(48000, 2), AudioFormat::new(48000, 2)),
        ("44k1_mono_to_48k_stereo", AudioFormat::new(44100, 1), AudioFormat::new(48000, 2)),
    ];

    // Typical buffer sizes used in real-time audio
    for buffer_size in [128usize, 512] {
        for (name, input, output) in cases {
            let shared = Arc::new(SharedState::new());
            shared.params.set_all_gains(&Preset::Vocal.gains());
            let mut processor = GraphProcessor::new(input, output, shared).unwrap();
            let mut buffer = vec![0.0_f32; buffer_size * output.channels as usize];
            let mut phase = 0.0_f32;

            group.throughput(Throughput::Elements(buffer_size as u64));
            group.bench_function(format!("{}_{}_frames", name, buffer_size), |b| {
                b.iter(|| {
                    processor.render(black_box(&mut buffer), |frame| {
                        phase += 0.01;
                        frame.fill(phase.sin() * 0.5);
                        true
                    })
                })
            });
        }
    }

    group.finish();
}

fn benchmark_enumeration(c: &mut Criterion) {
    let catalog = DeviceCatalog::new(Arc::new(SimulatedHardware::demo()));

    c.bench_function("enumerate_simulated_devices", |b| {
        b.iter(|| black_box(catalog.enumerate()))
    });
}

criterion_group!(benches, benchmark_processor, benchmark_enumeration);
criterion_main!(benches);
