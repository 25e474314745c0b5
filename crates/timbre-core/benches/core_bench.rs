//! Criterion benchmarks for timbre-core DSP primitives
//!
//! Run with: cargo bench -p timbre-core
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use timbre_core::{DelayLine, Interpolation, LadderFilter, Lfo, LfoWaveform, StateVariableFilter};

const SAMPLE_RATE: f32 = 48000.0;
const BLOCK_SIZES: &[usize] = &[64, 256, 1024];

fn test_signal(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| (std::f32::consts::TAU * 440.0 * i as f32 / SAMPLE_RATE).sin() * 0.5)
        .collect()
}

fn bench_svf(c: &mut Criterion) {
    let mut group = c.benchmark_group("SVF");
    for &block_size in BLOCK_SIZES {
        let input = test_signal(block_size);
        group.bench_with_input(BenchmarkId::new("static", block_size), &block_size, |b, _| {
            let mut svf = StateVariableFilter::new(SAMPLE_RATE);
            svf.set_cutoff(1000.0);
            svf.set_resonance(0.7);
            b.iter(|| {
                for &x in &input {
                    black_box(svf.process(black_box(x)));
                }
            });
        });
        group.bench_with_input(BenchmarkId::new("swept", block_size), &block_size, |b, _| {
            let mut svf = StateVariableFilter::new(SAMPLE_RATE);
            let mut lfo = Lfo::new(SAMPLE_RATE);
            lfo.set_frequency(5.0);
            b.iter(|| {
                for &x in &input {
                    svf.set_cutoff(1000.0 + 800.0 * lfo.advance());
                    black_box(svf.process(black_box(x)));
                }
            });
        });
    }
    group.finish();
}

fn bench_ladder(c: &mut Criterion) {
    let mut group = c.benchmark_group("Ladder");
    for &block_size in BLOCK_SIZES {
        let input = test_signal(block_size);
        group.bench_with_input(BenchmarkId::new("process", block_size), &block_size, |b, _| {
            let mut ladder = LadderFilter::new(SAMPLE_RATE);
            ladder.set_cutoff(1200.0);
            ladder.set_resonance(0.8);
            b.iter(|| {
                for &x in &input {
                    black_box(ladder.process(black_box(x)));
                }
            });
        });
    }
    group.finish();
}

fn bench_lfo(c: &mut Criterion) {
    let mut group = c.benchmark_group("LFO");
    for shape in [LfoWaveform::Sine, LfoWaveform::SmoothRandom] {
        group.bench_function(format!("{:?}", shape), |b| {
            let mut lfo = Lfo::new(SAMPLE_RATE);
            lfo.set_waveform(shape);
            b.iter(|| {
                for _ in 0..256 {
                    black_box(lfo.advance());
                }
            });
        });
    }
    group.finish();
}

fn bench_delay(c: &mut Criterion) {
    let mut group = c.benchmark_group("DelayLine");
    for interpolation in [Interpolation::Linear, Interpolation::Hermite] {
        let input = test_signal(512);
        group.bench_function(format!("{:?}", interpolation), |b| {
            let mut line = DelayLine::from_time(SAMPLE_RATE, 0.05);
            line.set_interpolation(interpolation);
            b.iter(|| {
                for &x in &input {
                    black_box(line.read_write(black_box(x), 733.4));
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_svf, bench_ladder, bench_lfo, bench_delay);
criterion_main!(benches);
