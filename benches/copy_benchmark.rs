//! Performance benchmarks for smartio
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use smartio::handle::pipe;
use smartio::{select, CopyOptions, CopyRequest, StreamCopier};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Create a test file of the specified size
fn create_test_file(dir: &Path, name: &str, size: usize) -> PathBuf {
    let path = dir.join(name);
    let mut file = File::create(&path).unwrap();

    let chunk_size = 64 * 1024;
    let chunk: Vec<u8> = (0..chunk_size).map(|i| (i % 256) as u8).collect();
    let mut remaining = size;

    while remaining > 0 {
        let to_write = remaining.min(chunk_size);
        file.write_all(&chunk[..to_write]).unwrap();
        remaining -= to_write;
    }

    path
}

fn bench_copy_methods(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_copy");

    for size in [64 * 1024, 1024 * 1024, 16 * 1024 * 1024] {
        let dir = TempDir::new().unwrap();
        let src_file = create_test_file(dir.path(), "src.bin", size);
        let dst_file = dir.path().join("dst.bin");
        let label = humansize::format_size(size as u64, humansize::BINARY);

        group.throughput(Throughput::Bytes(size as u64));

        for (name, use_zero_copy) in [("buffered", false), ("zero_copy", true)] {
            let copier = StreamCopier::new(CopyOptions {
                use_zero_copy,
                ..Default::default()
            });

            group.bench_with_input(BenchmarkId::new(name, &label), &size, |b, _| {
                b.iter(|| black_box(copier.copy(&src_file, &dst_file, None, None).unwrap()));
            });
        }
    }

    group.finish();
}

fn bench_offset_slice(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let src_file = create_test_file(dir.path(), "src.bin", 4 * 1024 * 1024);
    let source = File::open(&src_file).unwrap();
    let dst_file = dir.path().join("slice.bin");
    let copier = StreamCopier::default_copier();

    c.bench_function("copy_1m_slice_at_offset", |b| {
        b.iter(|| {
            let request = CopyRequest::new(&source, &dst_file)
                .length(1024 * 1024)
                .offset(1024 * 1024);
            black_box(copier.execute(request).unwrap())
        });
    });
}

fn bench_select_ready(c: &mut Criterion) {
    let (rd, wr) = pipe().unwrap();
    File::from(wr.try_clone().unwrap()).write_all(b"x").unwrap();

    c.bench_function("select_ready_pipe", |b| {
        b.iter(|| {
            black_box(select(&[&rd], &[&wr], &[], Some(Duration::ZERO)).unwrap());
        });
    });
}

criterion_group!(benches, bench_copy_methods, bench_offset_slice, bench_select_ready);
criterion_main!(benches);
