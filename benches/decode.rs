//! Benchmarks for BCJ2 decoding and tar scanning.
//!
//! Run with: `cargo bench`
//! Compare with baseline: `cargo bench -- --save-baseline main`
//! Compare against baseline: `cargo bench -- --baseline main`

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use omaha_payload::{Bcj2Decoder, Bcj2Streams, TarEntries};

const SIZE: usize = 1 << 20;

/// Main stream without a single candidate opcode: one long copy run.
fn plain_bytes(len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| match (i * 31 % 251) as u8 {
            0xE8 | 0xE9 | 0x0F => 0x90,
            b => b,
        })
        .collect()
}

/// Benchmark the copy loop alone.
fn bench_copy_run(c: &mut Criterion) {
    let main = plain_bytes(SIZE);
    let rc = [0u8; 5];

    let mut group = c.benchmark_group("bcj2");
    group.throughput(Throughput::Bytes(SIZE as u64));

    group.bench_function("copy_run", |b| {
        b.iter(|| {
            let streams = Bcj2Streams::new(black_box(&main), &[], &[], &rc);
            black_box(Bcj2Decoder::new(streams).decode(SIZE))
        });
    });

    group.finish();
}

/// Benchmark a candidate on every fourth byte.
///
/// An all-zero range coder stream decodes to "not converted" for every
/// candidate, so each one costs a bit decode but no address read.
fn bench_dense_candidates(c: &mut Criterion) {
    let main: Vec<u8> = (0..SIZE)
        .map(|i| if i % 4 == 0 { 0xE8 } else { 0x90 })
        .collect();
    let rc = vec![0u8; SIZE / 4 + 5];

    let mut group = c.benchmark_group("bcj2");
    group.throughput(Throughput::Bytes(SIZE as u64));

    group.bench_function("dense_candidates", |b| {
        b.iter(|| {
            let streams = Bcj2Streams::new(black_box(&main), &[], &[], &rc);
            black_box(Bcj2Decoder::new(streams).decode(SIZE))
        });
    });

    group.finish();
}

fn tar_header(name: &str, size: usize) -> [u8; 512] {
    let mut header = [0u8; 512];
    header[..name.len()].copy_from_slice(name.as_bytes());
    header[0x7C..0x7C + 12].copy_from_slice(format!("{:011o}\0", size).as_bytes());
    header[156] = b'0';
    header[257..265].copy_from_slice(b"ustar\x0000");
    header[148..156].fill(b' ');
    let sum: u32 = header.iter().map(|&b| b as u32).sum();
    header[148..156].copy_from_slice(format!("{:06o}\0 ", sum).as_bytes());
    header
}

/// Benchmark header scanning over an image of many small files.
fn bench_tar_listing(c: &mut Criterion) {
    let mut image = Vec::new();
    for i in 0..2000 {
        image.extend_from_slice(&tar_header(&format!("dir/file_{i}.dat"), 700));
        image.extend_from_slice(&[0x5A; 1024]);
    }
    image.extend_from_slice(&[0u8; 1024]);

    let mut group = c.benchmark_group("tar");
    group.throughput(Throughput::Bytes(image.len() as u64));

    group.bench_function("list_entries", |b| {
        b.iter(|| black_box(TarEntries::new(black_box(&image), 0).count()));
    });

    group.finish();
}

criterion_group!(benches, bench_copy_run, bench_dense_candidates, bench_tar_listing);
criterion_main!(benches);
