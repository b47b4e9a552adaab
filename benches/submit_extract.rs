//! Benchmarks for the submit / extract hot path
//!
//! Measures:
//! - SampleBuffer::submit for an existing user and for a new user
//! - Aggregator::submit including user validation and policy
//! - extract_and_clear + reduce for a populated window
//!
//! Run with: cargo bench --bench submit_extract

use count_relay::buffer::SampleBuffer;
use count_relay::snapshot::Snapshot;
use count_relay::types::UserId;
use count_relay::{Aggregator, reduce};
use divan::{Bencher, black_box};

fn main() {
    divan::main();
}

fn users(n: usize) -> Vec<UserId> {
    (0..n)
        .map(|i| UserId::new(format!("user-{i}")).unwrap())
        .collect()
}

// =============================================================================
// Submission
// =============================================================================

mod submit {
    use super::*;

    #[divan::bench(sample_count = 1000, sample_size = 1000)]
    fn existing_user(bencher: Bencher) {
        let buffer = SampleBuffer::new();
        let user = UserId::new("alice".to_string()).unwrap();
        buffer.submit(&user, 0.0).unwrap();
        bencher.bench(|| buffer.submit(black_box(&user), black_box(1.5)));
    }

    #[divan::bench(args = [16, 1024])]
    fn rotating_users(bencher: Bencher, n: usize) {
        let buffer = SampleBuffer::new();
        let ids = users(n);
        let mut i = 0;
        bencher.bench_local(|| {
            i = (i + 1) % ids.len();
            buffer.submit(black_box(&ids[i]), 1.0)
        });
    }

    #[divan::bench(sample_count = 1000, sample_size = 1000)]
    fn aggregator_str(bencher: Bencher) {
        let aggregator = Aggregator::default();
        bencher.bench(|| aggregator.submit(black_box("alice"), black_box(2.5)));
    }
}

// =============================================================================
// Extraction and reduction
// =============================================================================

mod window {
    use super::*;

    #[divan::bench(args = [10, 100, 1000])]
    fn extract_and_reduce(bencher: Bencher, n_users: usize) {
        let ids = users(n_users);
        bencher
            .with_inputs(|| {
                let buffer = SampleBuffer::new();
                for user in &ids {
                    for v in 0..8 {
                        buffer.submit(user, f64::from(v)).unwrap();
                    }
                }
                buffer
            })
            .bench_local_values(|buffer| {
                black_box(Snapshot::from_extraction(1, buffer.extract_and_clear()))
            });
    }

    #[divan::bench(args = [8, 512])]
    fn mean(bencher: Bencher, len: usize) {
        let samples: Vec<f64> = (0..len).map(|i| i as f64).collect();
        bencher.bench(|| reduce(black_box(&samples)));
    }
}
