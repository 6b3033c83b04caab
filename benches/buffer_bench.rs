// benches/buffer_bench.rs
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fastdfs_core::prelude::*;

fn bench_buffer_write_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_operations");

    for size in [256, 1024, 4096, 16384].iter() {
        group.bench_with_input(BenchmarkId::new("write_read", size), size, |b, &size| {
            b.iter(|| {
                let mut buf = Buffer::new(size);
                buf.put_u32(black_box(12345)).unwrap();
                buf.put_bytes(black_box(b"test data")).unwrap();
                buf.set_pos(0).unwrap();
                let _ = buf.get_u32().unwrap();
                let _ = buf.get_bytes(9).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_task_pool_acquire_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("task_pool");

    for mode in [AllocMode::WholeBlock, AllocMode::SeparateBuffer] {
        let label = match mode {
            AllocMode::WholeBlock => "whole_block",
            AllocMode::SeparateBuffer => "separate_buffer",
        };
        let pool = TaskPool::new(TaskPoolConfig {
            capacity: 256,
            min_buf: 4096,
            max_buf: if mode == AllocMode::WholeBlock { 4096 } else { 65536 },
            arg_size: 64,
            mode,
        })
        .unwrap();

        group.bench_function(label, |b| {
            b.iter(|| {
                let (id, mut task) = pool.acquire().expect("pool should not be exhausted");
                task.buffer.put_u32(black_box(42)).unwrap();
                task.buffer.put_bytes(black_box(&[0u8; 512])).unwrap();
                pool.release(id, task);
            });
        });
    }

    group.finish();
}

fn bench_direct_buffer_alloc(c: &mut Criterion) {
    c.bench_function("direct_buffer_alloc", |b| {
        b.iter(|| {
            let mut buf = Buffer::new(4096);
            buf.put_u32(black_box(42)).unwrap();
            buf.put_bytes(black_box(&[0u8; 512])).unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_buffer_write_read,
    bench_task_pool_acquire_release,
    bench_direct_buffer_alloc
);
criterion_main!(benches);
