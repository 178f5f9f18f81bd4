use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use flakeid::{CUSTOM_EPOCH, IdGenerator, NodeId, SnowflakeGenerator, TimeSource};
use std::{
    sync::{Arc, Barrier},
    thread::scope,
    time::Instant,
};

/// Advances one millisecond on every read so the sequence never runs out.
struct TickingMockTime {
    millis: core::cell::Cell<u64>,
}

impl TimeSource for TickingMockTime {
    fn current_millis(&self) -> u64 {
        let now = self.millis.get() + 1;
        self.millis.set(now);
        now
    }
}

// Number of IDs generated per benchmark iteration (per-thread for
// multi-threaded).
const TOTAL_IDS: usize = 4096;

/// Benchmarks the hot path where the clock never stalls.
fn bench_hot_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("mock/lock");
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    group.bench_function(format!("elems/{TOTAL_IDS}"), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                let generator = SnowflakeGenerator::with_time(
                    CUSTOM_EPOCH,
                    NodeId::new(0, 1),
                    TickingMockTime {
                        millis: core::cell::Cell::new(CUSTOM_EPOCH.as_millis()),
                    },
                );
                for _ in 0..TOTAL_IDS {
                    black_box(generator.next_id());
                }
            }
            start.elapsed()
        });
    });

    group.finish();
}

/// Benchmarks against the wall clock, including sequence exhaustion spins.
fn bench_system_clock(c: &mut Criterion) {
    let mut group = c.benchmark_group("system_clock/lock");
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    let generator = SnowflakeGenerator::with_node(CUSTOM_EPOCH, NodeId::new(0, 1));
    group.bench_function(format!("elems/{TOTAL_IDS}"), |b| {
        b.iter(|| {
            for _ in 0..TOTAL_IDS {
                black_box(generator.next_id());
            }
        });
    });

    group.finish();
}

/// Benchmarks a single generator shared by every core.
fn bench_contended<G>(c: &mut Criterion, group_name: &str, generator: G)
where
    G: IdGenerator + Send + Sync,
{
    let threads = num_cpus::get();
    let mut group = c.benchmark_group(group_name);
    group.throughput(Throughput::Elements((TOTAL_IDS * threads) as u64));

    let generator = Arc::new(generator);
    group.bench_function(format!("threads/{threads}/elems/{TOTAL_IDS}"), |b| {
        b.iter_custom(|iters| {
            let barrier = Arc::new(Barrier::new(threads + 1));
            let start = scope(|s| {
                for _ in 0..threads {
                    let generator = Arc::clone(&generator);
                    let barrier = Arc::clone(&barrier);
                    s.spawn(move || {
                        barrier.wait();
                        for _ in 0..iters {
                            for _ in 0..TOTAL_IDS {
                                black_box(generator.next_id());
                            }
                        }
                    });
                }
                barrier.wait();
                Instant::now()
            });
            start.elapsed()
        });
    });

    group.finish();
}

fn bench_shared(c: &mut Criterion) {
    bench_contended(
        c,
        "system_clock/lock/contended",
        SnowflakeGenerator::with_node(CUSTOM_EPOCH, NodeId::new(0, 1)),
    );
}

criterion_group!(benches, bench_hot_path, bench_system_clock, bench_shared);
criterion_main!(benches);
