// benches/timer_bench.rs
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fastdfs_core::prelude::*;

fn bench_add_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("timing_wheel_add_remove");

    for slots in [61usize, 1021].iter() {
        group.bench_with_input(BenchmarkId::new("add_then_remove", slots), slots, |b, &slots| {
            let mut wheel = TimingWheel::new(slots, 1_000_000).unwrap();
            b.iter(|| {
                let id = wheel.add(black_box(1_000_010), TimerOwner::Anonymous);
                wheel.remove(id).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_modify_lazy_rehash(c: &mut Criterion) {
    c.bench_function("modify_lazy_rehash", |b| {
        let mut wheel = TimingWheel::new(1021, 1_000_000).unwrap();
        let id = wheel.add(1_000_010, TimerOwner::Anonymous);
        let mut expires = 1_000_010u64;
        b.iter(|| {
            expires += 1;
            wheel.modify(id, black_box(expires)).unwrap();
        });
    });
}

fn bench_sweep_populated_wheel(c: &mut Criterion) {
    let mut group = c.benchmark_group("timing_wheel_sweep");

    for count in [100usize, 1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::new("sweep_one_second", count), count, |b, &count| {
            b.iter_batched(
                || {
                    let mut wheel = TimingWheel::new(1021, 1_000_000).unwrap();
                    for i in 0..count {
                        wheel.add(1_000_000 + 1 + (i as u64 % 900), TimerOwner::Anonymous);
                    }
                    wheel
                },
                |mut wheel| {
                    let _ = wheel.sweep(black_box(1_000_901));
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_add_remove, bench_modify_lazy_rehash, bench_sweep_populated_wheel);
criterion_main!(benches);
