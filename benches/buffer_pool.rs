//! Buffer pool benchmarks
//!
//! Pin/unpin cost on a resident page, misses that force FIFO eviction, and
//! space map allocation across map pages.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pagekeeper::{Database, PageId, PagePool, PinMode, StorageConfig};
use tempfile::tempdir;

fn pin_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("pin_operations");

    group.bench_function("hit", |b| {
        let dir = tempdir().unwrap();
        let config = StorageConfig::default().with_pool_size(16);
        let db = Database::create(dir.path().join("bench.db"), 64, &config).unwrap();
        let bpm = db.buffer_pool();
        let page = db.allocate_run(1).unwrap();
        bpm.pin_page(page, PinMode::Read).unwrap();
        bpm.unpin_page(page, false).unwrap();

        b.iter(|| {
            let frame = bpm.pin_page(black_box(page), PinMode::Read).unwrap();
            black_box(frame.pin_count());
            bpm.unpin_page(page, false).unwrap();
        })
    });

    // Cycle through more pages than frames so every pin misses
    for pool_size in [4usize, 16, 64] {
        group.bench_with_input(
            BenchmarkId::new("miss_cycle", pool_size),
            &pool_size,
            |b, &pool_size| {
                let dir = tempdir().unwrap();
                let config = StorageConfig::default().with_pool_size(pool_size);
                let db = Database::create(dir.path().join("bench.db"), 512, &config).unwrap();
                let bpm = db.buffer_pool();
                let span = pool_size as u32 * 2;
                let start = db.allocate_run(span).unwrap();
                let mut next = 0u32;

                b.iter(|| {
                    let page = PageId::new(start.0 + next % span);
                    next = next.wrapping_add(1);
                    let guard = bpm.fetch_page_write(page).unwrap();
                    black_box(guard.page_id());
                })
            },
        );
    }

    group.finish();
}

fn space_map_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("space_map");

    for run in [1u32, 16, 128] {
        group.bench_with_input(BenchmarkId::new("alloc_free", run), &run, |b, &run| {
            let dir = tempdir().unwrap();
            let config = StorageConfig::default().with_bits_per_map_page(64);
            let db = Database::create(dir.path().join("bench.db"), 2048, &config).unwrap();

            b.iter(|| {
                let start = db.allocate_run(black_box(run)).unwrap();
                db.deallocate_run(start, run).unwrap();
            })
        });
    }

    group.finish();
}

criterion_group!(benches, pin_operations, space_map_operations);
criterion_main!(benches);
