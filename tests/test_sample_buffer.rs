//! Tests for the sample buffer and the extract/reduce path
//!
//! Covers atomic extraction under concurrent submitters and the
//! partition property: every accepted sample lands in exactly one
//! extraction.

use count_relay::buffer::SampleBuffer;
use count_relay::snapshot::Snapshot;
use count_relay::types::UserId;
use count_relay::{AggregateError, reduce};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

fn user(name: &str) -> UserId {
    UserId::try_from(name).unwrap()
}

/// Test the alice/bob window from end to end without a scheduler
#[test]
fn test_window_reduces_to_means() {
    let buffer = SampleBuffer::new();
    buffer.submit(&user("alice"), 10.0).unwrap();
    buffer.submit(&user("alice"), 20.0).unwrap();
    buffer.submit(&user("bob"), 5.0).unwrap();

    let snapshot = Snapshot::from_extraction(1, buffer.extract_and_clear());

    assert_eq!(snapshot.get("alice"), Some(15.0));
    assert_eq!(snapshot.get("bob"), Some(5.0));
    assert_eq!(snapshot.sample_count, 3);
    assert!(buffer.is_empty());

    // Next window starts from nothing
    let next = Snapshot::from_extraction(2, buffer.extract_and_clear());
    assert!(next.is_empty());
}

/// Test that non-finite values never reach the buffer
#[test]
fn test_non_finite_rejected() {
    let buffer = SampleBuffer::new();
    for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let err = buffer.submit(&user("alice"), value).unwrap_err();
        assert!(matches!(err, AggregateError::InvalidSample { .. }));
    }
    assert!(buffer.is_empty());
}

/// Test extraction racing submitters: nothing lost, nothing duplicated
#[test]
fn test_concurrent_extract_partitions_samples() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 2_000;

    let buffer = Arc::new(SampleBuffer::new());
    let done = Arc::new(AtomicBool::new(false));

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                let id = user(&format!("producer-{p}"));
                for i in 0..PER_PRODUCER {
                    buffer.submit(&id, i as f64).unwrap();
                }
            })
        })
        .collect();

    let extractor = {
        let buffer = Arc::clone(&buffer);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut seen: HashMap<UserId, Vec<f64>> = HashMap::new();
            loop {
                let finished = done.load(Ordering::Acquire);
                for (user, samples) in buffer.extract_and_clear() {
                    seen.entry(user).or_default().extend(samples);
                }
                if finished {
                    break;
                }
                thread::yield_now();
            }
            seen
        })
    };

    for producer in producers {
        producer.join().unwrap();
    }
    done.store(true, Ordering::Release);
    let seen = extractor.join().unwrap();

    assert_eq!(seen.len(), PRODUCERS);
    for samples in seen.values() {
        // Per-user order is submission order across extractions
        let expected: Vec<f64> = (0..PER_PRODUCER).map(|i| i as f64).collect();
        assert_eq!(samples, &expected);
    }
    assert!(buffer.is_empty());
}

proptest! {
    #[test]
    fn prop_extractions_partition_submissions(
        ops in prop::collection::vec((0usize..4, -1e6f64..1e6, any::<bool>()), 0..200)
    ) {
        let names = ["alice", "bob", "carol", "dave"];
        let buffer = SampleBuffer::new();
        let mut submitted: HashMap<UserId, Vec<f64>> = HashMap::new();
        let mut extracted: HashMap<UserId, Vec<f64>> = HashMap::new();

        for (who, value, extract_after) in ops {
            let id = user(names[who]);
            buffer.submit(&id, value).unwrap();
            submitted.entry(id).or_default().push(value);
            if extract_after {
                for (user, samples) in buffer.extract_and_clear() {
                    prop_assert!(!samples.is_empty());
                    extracted.entry(user).or_default().extend(samples);
                }
            }
        }
        for (user, samples) in buffer.extract_and_clear() {
            extracted.entry(user).or_default().extend(samples);
        }

        prop_assert_eq!(submitted, extracted);
    }

    #[test]
    fn prop_mean_within_bounds(samples in prop::collection::vec(-1e9f64..1e9, 1..64)) {
        let mean = reduce(&samples).unwrap();
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        // Allow for rounding in the running sum
        let slack = 1e-6 * (max.abs() + min.abs() + 1.0);
        prop_assert!(mean >= min - slack && mean <= max + slack);
    }

    #[test]
    fn prop_mean_of_constant_is_constant(value in -1e9f64..1e9, n in 1usize..32) {
        let samples = vec![value; n];
        let mean = reduce(&samples).unwrap();
        prop_assert!((mean - value).abs() <= 1e-9 * value.abs().max(1.0));
    }

    #[test]
    fn prop_mean_of_single_value_is_exact(value in any::<f64>().prop_filter("finite", |v| v.is_finite())) {
        prop_assert_eq!(reduce(&[value]).unwrap(), value);
    }

    #[test]
    fn prop_mean_of_pair_is_half_sum(
        a in any::<f64>().prop_filter("finite", |v| v.is_finite()),
        b in any::<f64>().prop_filter("finite", |v| v.is_finite()),
    ) {
        let mean = reduce(&[a, b]).unwrap();
        prop_assert!(mean.is_finite());
        if (a + b).is_finite() {
            prop_assert_eq!(mean, (a + b) / 2.0);
        }
    }
}
