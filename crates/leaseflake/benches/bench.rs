use core::hint::black_box;
use core::time::Duration;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use futures::future::try_join_all;
use leaseflake::{
    Config, IdGenStatus, IdService, Layout, LeasedGenerator, MemoryLeaseStore, Result, TimeSource,
    WallClock, WorkerIdentity,
};
use std::{
    sync::{Arc, Barrier},
    thread::scope,
    time::Instant,
};
use tokio::runtime::Builder;

struct FixedMockTime {
    millis: u64,
}

impl TimeSource for FixedMockTime {
    fn current_millis(&self) -> u64 {
        self.millis
    }
}

// Number of IDs generated per benchmark iteration (per-thread for
// multi-threaded). Equal to one full millisecond of the default layout.
const TOTAL_IDS: usize = 4096;

const TOLERANCE: Duration = Duration::from_millis(5);

fn generator<T: TimeSource>(worker_id: u64, time: T) -> LeasedGenerator<T> {
    LeasedGenerator::new(
        Layout::TWITTER,
        Arc::new(WorkerIdentity::new(worker_id)),
        time,
        TOLERANCE,
    )
    .unwrap()
}

/// Hot path: the clock never moves and the sequence never runs out.
fn benchmark_mock_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("mock/sequential");
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    group.bench_function(format!("elems/{}", TOTAL_IDS), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();

            for _ in 0..iters {
                let generator = generator(0, FixedMockTime { millis: 1 });
                for _ in 0..TOTAL_IDS {
                    match generator.try_poll_id().unwrap() {
                        IdGenStatus::Ready { id } => {
                            black_box(id);
                        }
                        IdGenStatus::Pending { .. } => unreachable!(),
                    }
                }
            }

            start.elapsed()
        });
    });

    group.finish();
}

/// Real wall clock, including waits for the next millisecond.
fn benchmark_wall_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("wall/sequential");
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    group.bench_function(format!("elems/{}", TOTAL_IDS), |b| {
        let generator = generator(0, WallClock::default());
        b.iter(|| {
            for _ in 0..TOTAL_IDS {
                black_box(generator.next_id().unwrap());
            }
        });
    });

    group.finish();
}

/// Many threads contending for one generator.
fn benchmark_wall_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("wall/contended");

    for threads in [1, 2, 4, 8] {
        group.throughput(Throughput::Elements((TOTAL_IDS * threads) as u64));
        group.bench_function(format!("elems/{}/threads/{}", TOTAL_IDS, threads), |b| {
            b.iter_custom(|iters| {
                let generator = generator(0, WallClock::default());
                let barrier = Barrier::new(threads + 1);
                let start = scope(|s| {
                    for _ in 0..threads {
                        s.spawn(|| {
                            barrier.wait();
                            for _ in 0..iters {
                                for _ in 0..TOTAL_IDS {
                                    black_box(generator.next_id().unwrap());
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
    }

    group.finish();
}

/// Tokio tasks sharing one generator through the async path.
fn benchmark_wall_tokio(c: &mut Criterion) {
    let mut group = c.benchmark_group("wall/tokio");
    group.sample_size(10);

    let total_ids = TOTAL_IDS * 64;

    for num_tasks in [1, 8, 64, 512] {
        let ids_per_task = total_ids / num_tasks;

        group.throughput(Throughput::Elements(total_ids as u64));
        group.bench_function(format!("elems/{}/tasks/{}", total_ids, num_tasks), |b| {
            let rt = Builder::new_multi_thread().enable_all().build().unwrap();

            b.to_async(&rt).iter_custom(move |iters| async move {
                let generator = Arc::new(generator(0, WallClock::default()));
                let start = Instant::now();

                for _ in 0..iters {
                    let mut tasks: Vec<tokio::task::JoinHandle<Result<()>>> =
                        Vec::with_capacity(num_tasks);

                    for _ in 0..num_tasks {
                        let generator = Arc::clone(&generator);
                        tasks.push(tokio::spawn(async move {
                            for _ in 0..ids_per_task {
                                black_box(generator.next_id_async().await?);
                            }
                            Ok(())
                        }));
                    }

                    for result in try_join_all(tasks).await.unwrap() {
                        result.unwrap();
                    }
                }

                start.elapsed()
            });
        });
    }

    group.finish();
}

/// Full startup and shutdown against the in-memory store.
fn benchmark_service_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("service/lifecycle");
    let rt = Builder::new_multi_thread().enable_all().build().unwrap();

    group.bench_function("start_shutdown", |b| {
        b.to_async(&rt).iter(|| async {
            let store = Arc::new(MemoryLeaseStore::new());
            let service = IdService::start(Config::default(), store).await.unwrap();
            black_box(service.worker_id());
            service.shutdown().await;
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_mock_sequential,
    benchmark_wall_sequential,
    benchmark_wall_contended,
    benchmark_wall_tokio,
    benchmark_service_lifecycle,
);

criterion_main!(benches);
