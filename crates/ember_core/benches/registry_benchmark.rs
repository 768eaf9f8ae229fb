//! # Registry Benchmark
//!
//! Cost of a register -> invalidate -> unregister -> process cycle.
//!
//! Run with: `cargo bench --package ember_core --bench registry_benchmark`

// Benchmarks don't need docs
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ember_core::{
    empty_action, ActionRef, Lifecycle, LifecycleExt, LifecycleObject, OneShotAction,
    RegistryConfig, ResourceRegistry,
};
use std::sync::Arc;

struct Blob {
    lifecycle: Lifecycle,
    init: ActionRef,
    release: ActionRef,
}

impl Blob {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            lifecycle: Lifecycle::new(),
            init: OneShotAction::from_fn(|| {}).into_ref(),
            release: OneShotAction::from_fn(|| {}).into_ref(),
        })
    }
}

impl LifecycleObject for Blob {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn initializer(&self) -> ActionRef {
        Arc::clone(&self.init)
    }

    fn updater(&self) -> ActionRef {
        empty_action()
    }

    fn releaser(&self) -> ActionRef {
        Arc::clone(&self.release)
    }
}

/// Benchmark: full lifecycle of N objects within one frame.
fn bench_frame_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_cycle");

    for count in [100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let registry = ResourceRegistry::new(RegistryConfig::default()).unwrap();
            b.iter(|| {
                let blobs: Vec<_> = (0..count).map(|_| Blob::new()).collect();
                for blob in &blobs {
                    registry.register(blob).unwrap();
                }
                for blob in &blobs {
                    blob.invalidate().unwrap();
                    registry.unregister(&**blob).unwrap();
                }
                black_box(registry.process().unwrap())
            });
        });
    }

    group.finish();
}

/// Benchmark: an idle frame with many live objects.
fn bench_idle_process(c: &mut Criterion) {
    let registry = ResourceRegistry::new(RegistryConfig::default()).unwrap();
    let blobs: Vec<_> = (0..10_000).map(|_| Blob::new()).collect();
    for blob in &blobs {
        registry.register(blob).unwrap();
    }
    registry.process().unwrap();

    c.bench_function("idle_process_10k_live", |b| {
        b.iter(|| black_box(registry.process().unwrap()));
    });
}

criterion_group!(benches, bench_frame_cycle, bench_idle_process);
criterion_main!(benches);
