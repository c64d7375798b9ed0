//! Criterion benchmarks for the detection phases on a textured 32³ volume.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use neuron_core::eigen::solve_field;
use neuron_core::tensor::{aggregate, build_structure_tensor, estimate_gradient};
use neuron_core::{downsample, Dims, GaussianKernel, MeasureVariant, Pipeline, PipelineConfig, Volume};

fn textured(n: usize) -> Volume {
    let dims = Dims::new(n, n, n);
    let data = (0..dims.len())
        .map(|i| {
            let (z, y, x) = dims.coords(i);
            0.5 + 0.25 * (0.7 * x as f64).sin() * (0.5 * y as f64).cos() + 0.25 * (0.3 * z as f64).sin()
        })
        .collect();
    Volume::new(dims, data).unwrap()
}

// ── tensor phases ───────────────────────────────────────────────────

fn bench_gradient(c: &mut Criterion) {
    let vol = textured(32);
    c.bench_function("gradient_32", |b| b.iter(|| estimate_gradient(black_box(&vol))));
}

fn bench_aggregate(c: &mut Criterion) {
    let vol = textured(32);
    let structure = build_structure_tensor(estimate_gradient(&vol));
    for size in [3, 5] {
        let kernel = GaussianKernel::new(size, 0.8 * size as f64 / 3.0).unwrap();
        c.bench_function(&format!("aggregate_32_w{}", size), |b| {
            b.iter(|| aggregate(black_box(&structure), &kernel))
        });
    }
}

// ── eigen-decomposition ─────────────────────────────────────────────

fn bench_eigen(c: &mut Criterion) {
    let vol = textured(32);
    let kernel = GaussianKernel::new(3, 0.8).unwrap();
    let field = aggregate(&build_structure_tensor(estimate_gradient(&vol)), &kernel);
    c.bench_function("eigen_32", |b| b.iter(|| solve_field(black_box(&field))));
}

// ── end to end ──────────────────────────────────────────────────────

fn bench_pipeline(c: &mut Criterion) {
    let vol = textured(32);
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    c.bench_function("analyze_32", |b| {
        b.iter(|| pipeline.analyze(black_box(vol.clone())))
    });

    let analysis = pipeline.analyze(vol).unwrap();
    c.bench_function("measure_eigen_combination_32", |b| {
        b.iter(|| analysis.measure(black_box(MeasureVariant::default())))
    });
}

fn bench_downsample(c: &mut Criterion) {
    let vol = textured(64);
    c.bench_function("downsample_64_m2", |b| b.iter(|| downsample(black_box(&vol), 2, 0.8)));
}

criterion_group!(
    benches,
    bench_gradient,
    bench_aggregate,
    bench_eigen,
    bench_pipeline,
    bench_downsample,
);
criterion_main!(benches);
