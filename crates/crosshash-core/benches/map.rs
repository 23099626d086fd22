//! Benchmarks for the retrieval evaluator.
//!
//! Run with: cargo bench -p crosshash-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array2;

fn random_codes(rows: usize, cols: usize, seed: u64) -> Array2<f32> {
    // Small xorshift keeps the bench free of extra dependencies.
    let mut state = seed | 1;
    Array2::from_shape_fn((rows, cols), |_| {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        if state & 1 == 0 {
            1.0
        } else {
            -1.0
        }
    })
}

fn random_labels(rows: usize, classes: usize, seed: u64) -> Array2<f32> {
    let mut state = seed | 1;
    Array2::from_shape_fn((rows, classes), |_| {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        if state % 5 == 0 {
            1.0
        } else {
            0.0
        }
    })
}

fn benchmark_map_full(c: &mut Criterion) {
    let query = random_codes(500, 128, 7);
    let retrieval = random_codes(4000, 128, 11);
    let q_labels = random_labels(500, 24, 13);
    let r_labels = random_labels(4000, 24, 17);

    c.bench_function("map_500x4000_128bit", |b| {
        b.iter(|| {
            crosshash_core::mean_average_precision(
                black_box(&query.view()),
                black_box(&retrieval.view()),
                black_box(&q_labels.view()),
                black_box(&r_labels.view()),
                None,
            )
            .unwrap()
        })
    });
}

fn benchmark_map_top_k(c: &mut Criterion) {
    let query = random_codes(500, 128, 7);
    let retrieval = random_codes(4000, 128, 11);
    let q_labels = random_labels(500, 24, 13);
    let r_labels = random_labels(4000, 24, 17);

    c.bench_function("map_500x4000_128bit_top50", |b| {
        b.iter(|| {
            crosshash_core::mean_average_precision(
                black_box(&query.view()),
                black_box(&retrieval.view()),
                black_box(&q_labels.view()),
                black_box(&r_labels.view()),
                Some(50),
            )
            .unwrap()
        })
    });
}

criterion_group!(benches, benchmark_map_full, benchmark_map_top_k);
criterion_main!(benches);
