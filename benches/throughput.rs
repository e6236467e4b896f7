//! Throughput Benchmark for FlashLog
//!
//! This benchmark measures the connection buffer and the line processor
//! under different record sizes and read fragmentations.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use flashlog::buffer::ConnBuffer;
use flashlog::protocol::{LineProcessor, ProtocolProcessor};
use flashlog::reactor::Token;
use tokio::sync::mpsc::unbounded_channel;

/// Builds `count` newline-terminated records of `size` bytes each
fn records(count: usize, size: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(count * (size + 1));
    for i in 0..count {
        let line = format!("{:0width$}", i, width = size);
        data.extend_from_slice(&line.as_bytes()[..size]);
        data.push(b'\n');
    }
    data
}

/// Feeds `data` through a buffer in `read_size` pieces, as short reads would
fn ingest(data: &[u8], read_size: usize, processor: &mut LineProcessor) -> usize {
    let mut buffer = ConnBuffer::new(4096, 4096, 1024 * 1024).unwrap();
    let mut frames = 0;
    for piece in data.chunks(read_size) {
        buffer.reserve_at_least(piece.len()).unwrap();
        buffer.spare_mut()[..piece.len()].copy_from_slice(piece);
        buffer.commit(piece.len()).unwrap();
        frames += processor.process(Token(1), &mut buffer).unwrap();
    }
    frames
}

/// Benchmark line processing with different record sizes
fn bench_line_processor(c: &mut Criterion) {
    let mut group = c.benchmark_group("line_processor");

    for (name, size) in [("small", 64), ("medium", 1024), ("large", 16 * 1024)] {
        let data = records(256, size);
        group.throughput(Throughput::Bytes(data.len() as u64));

        group.bench_function(name, |b| {
            let (tx, mut rx) = unbounded_channel();
            let mut processor = LineProcessor::new(64 * 1024, tx);
            b.iter(|| {
                let frames = ingest(black_box(&data), 4096, &mut processor);
                while rx.try_recv().is_ok() {}
                frames
            });
        });
    }

    group.finish();
}

/// Benchmark how fragmentation of reads affects ingestion
fn bench_fragmentation(c: &mut Criterion) {
    let data = records(1024, 100);
    let mut group = c.benchmark_group("fragmentation");
    group.throughput(Throughput::Bytes(data.len() as u64));

    for read_size in [7, 512, 4096] {
        group.bench_function(format!("read_{}", read_size), |b| {
            let (tx, mut rx) = unbounded_channel();
            let mut processor = LineProcessor::new(4096, tx);
            b.iter(|| {
                let frames = ingest(black_box(&data), read_size, &mut processor);
                while rx.try_recv().is_ok() {}
                frames
            });
        });
    }

    group.finish();
}

/// Benchmark buffer growth up to the ceiling
fn bench_buffer_growth(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer");

    group.bench_function("grow_to_ceiling", |b| {
        b.iter(|| {
            let mut buffer = ConnBuffer::new(4096, 4096, 1024 * 1024).unwrap();
            while buffer.reserve_at_least(buffer.available() + 1).is_ok() {
                let free = buffer.available();
                buffer.commit(free).unwrap();
            }
            black_box(buffer.capacity())
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_line_processor,
    bench_fragmentation,
    bench_buffer_growth
);
criterion_main!(benches);
