//! Benchmarks for the channel write path.
//!
//! Run with: cargo bench --package drf-write
//!
//! ## Benchmark Categories
//!
//! - **Path Planning**: index-to-slot resolution throughput
//! - **Continuous Writes**: single-run block appends
//! - **Gapped Writes**: multi-run block appends with index maintenance

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use drf_write::{ChannelConfig, ChannelLayout, ChannelWriter, SampleRate};
use tempfile::TempDir;

/// One second of 1 MHz complex-free i16 data.
fn generate_block(count: usize) -> Vec<i16> {
    (0..count).map(|i| (i % 4096) as i16).collect()
}

fn bench_slot_planning(c: &mut Criterion) {
    let rate = SampleRate::new(1_000_000, 1).unwrap();
    let layout = ChannelLayout::new("/data/ch0", 3600, 1000, rate);

    c.bench_function("layout_slot_1m", |b| {
        b.iter(|| {
            for index in (0..1_000_000u64).step_by(1000) {
                black_box(layout.slot(black_box(index)));
            }
        })
    });
}

fn bench_continuous_write(c: &mut Criterion) {
    let block = generate_block(1_000_000);

    let mut group = c.benchmark_group("continuous_write");
    group.throughput(Throughput::Bytes((block.len() * 2) as u64));
    group.sample_size(10);
    group.bench_function("write_1s_at_1mhz", |b| {
        b.iter_with_setup(
            || {
                let temp_dir = TempDir::new().unwrap();
                let rate = SampleRate::new(1_000_000, 1).unwrap();
                let mut config = ChannelConfig::new(3600, 1000, rate, 1);
                config.is_continuous = true;
                let writer =
                    ChannelWriter::<i16>::create(temp_dir.path().join("ch0"), config, 0).unwrap();
                (temp_dir, writer)
            },
            |(_temp_dir, mut writer)| {
                writer.write(black_box(&block)).unwrap();
                writer.close().unwrap();
            },
        )
    });
    group.finish();
}

fn bench_gapped_write(c: &mut Criterion) {
    let block = generate_block(500_000);
    let global_indices: Vec<u64> = (0..50u64).map(|i| i * 20_000).collect();
    let block_offsets: Vec<u64> = (0..50u64).map(|i| i * 10_000).collect();

    let mut group = c.benchmark_group("gapped_write");
    group.throughput(Throughput::Bytes((block.len() * 2) as u64));
    group.sample_size(10);
    group.bench_function("write_50_runs_at_1mhz", |b| {
        b.iter_with_setup(
            || {
                let temp_dir = TempDir::new().unwrap();
                let rate = SampleRate::new(1_000_000, 1).unwrap();
                let config = ChannelConfig::new(3600, 1000, rate, 1);
                let writer =
                    ChannelWriter::<i16>::create(temp_dir.path().join("ch0"), config, 0).unwrap();
                (temp_dir, writer)
            },
            |(_temp_dir, mut writer)| {
                writer
                    .write_blocks(black_box(&block), &global_indices, &block_offsets)
                    .unwrap();
                writer.close().unwrap();
            },
        )
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_slot_planning,
    bench_continuous_write,
    bench_gapped_write
);
criterion_main!(benches);
