//! Randomized integration test for the interval id allocator.

use ember_core::IdAllocator;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

/// Free intervals and allocated ids must partition `[base, high_water_mark)`.
fn assert_partition(allocator: &IdAllocator<u64>, allocated: &BTreeSet<u32>) {
    let intervals = allocator.free_intervals();

    for pair in intervals.windows(2) {
        assert!(
            pair[0].end < pair[1].start,
            "intervals overlap or touch: {:?} {:?}",
            pair[0],
            pair[1]
        );
    }

    let mut covered: Vec<u32> = intervals.iter().flat_map(|r| r.clone()).collect();
    covered.extend(allocated.iter().copied());
    covered.sort_unstable();

    let expected: Vec<u32> = (allocator.base()..allocator.high_water_mark()).collect();
    assert_eq!(covered, expected);
}

#[test]
fn test_random_churn_keeps_partition() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x00E3_BE12);
    let allocator: IdAllocator<u64> = IdAllocator::with_base(1);
    let mut allocated = BTreeSet::new();

    for step in 0..5_000u64 {
        if allocated.is_empty() || rng.gen_bool(0.55) {
            let id = allocator.allocate_with(step).unwrap();
            let lowest_free = allocator_lowest_expected(&allocated, allocator.base());
            assert_eq!(id, lowest_free, "allocation must take the lowest free id");
            assert!(allocated.insert(id));
        } else {
            let index = rng.gen_range(0..allocated.len());
            let id = *allocated.iter().nth(index).unwrap();
            assert!(allocator.free(id).unwrap().is_some());
            allocated.remove(&id);
            assert!(allocator.free(id).unwrap_err().is_invalid_argument());
        }

        if step % 97 == 0 {
            assert_partition(&allocator, &allocated);
        }
    }

    assert_partition(&allocator, &allocated);
    assert_eq!(allocator.len(), allocated.len());
    assert_eq!(allocator.ids(), allocated.iter().copied().collect::<Vec<_>>());
}

/// Lowest id not in `allocated`, starting at `base`.
fn allocator_lowest_expected(allocated: &BTreeSet<u32>, base: u32) -> u32 {
    (base..).find(|id| !allocated.contains(id)).unwrap()
}

#[test]
fn test_free_everything_coalesces_to_one_interval() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let allocator: IdAllocator<u64> = IdAllocator::new();
    let mut ids: Vec<u32> = (0..1_000).map(|i| allocator.allocate_with(i).unwrap()).collect();

    // Shuffle by swapping with random positions
    for i in (1..ids.len()).rev() {
        let j = rng.gen_range(0..=i);
        ids.swap(i, j);
    }
    for id in ids {
        allocator.free(id).unwrap();
    }

    assert!(allocator.is_empty());
    assert_eq!(allocator.free_intervals(), vec![0..1_000]);
    assert_eq!(allocator.allocate().unwrap(), 0);
}

#[test]
fn test_concurrent_churn_no_duplicates() {
    let allocator = Arc::new(IdAllocator::<u64>::with_base(1));

    let workers: Vec<_> = (0..8u64)
        .map(|t| {
            let allocator = Arc::clone(&allocator);
            thread::spawn(move || {
                let mut rng = ChaCha8Rng::seed_from_u64(t);
                let mut mine = Vec::new();
                for step in 0..2_000u64 {
                    if mine.is_empty() || rng.gen_bool(0.6) {
                        let id = allocator.allocate_with(t * 10_000 + step).unwrap();
                        assert_eq!(allocator.lookup(id), Some(t * 10_000 + step));
                        mine.push(id);
                    } else {
                        let index = rng.gen_range(0..mine.len());
                        let id = mine.swap_remove(index);
                        allocator.free(id).unwrap();
                    }
                }
                mine
            })
        })
        .collect();

    let mut kept: Vec<u32> = workers
        .into_iter()
        .flat_map(|w| w.join().unwrap())
        .collect();
    let total = kept.len();
    kept.sort_unstable();
    kept.dedup();

    assert_eq!(kept.len(), total, "an id was handed out twice");
    assert_eq!(allocator.len(), total);
    assert_partition(&allocator, &kept.into_iter().collect());
}
