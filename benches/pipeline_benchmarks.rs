//! Performance benchmarks for the splatcam frame pipeline
//!
//! Run with: cargo bench --bench pipeline_benchmarks
//!
//! Measures per-tick encode cost at common capture sizes and the overhead of
//! the drop-oldest transport queue and wire header serialization.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use splatcam::capture::FrameEncoder;
use splatcam::testing::{synthetic_frame, synthetic_rgb_image};
use splatcam::transport::{ControlMessage, FrameHeader, TransportQueue};
use splatcam::types::{FrameEncoding, MediaType};
use std::time::Duration;

fn bench_frame_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("Frame Encoding");
    group.measurement_time(Duration::from_secs(10));

    let resolutions = [(640, 360, "360p"), (1280, 720, "720p")];
    for (width, height, name) in resolutions {
        let source = synthetic_rgb_image(7, 1920, 1080);
        group.throughput(Throughput::Elements(1));

        let jpeg = FrameEncoder::new(
            width,
            height,
            FrameEncoding {
                media_type: MediaType::Jpeg,
                quality: 0.7,
            },
        );
        group.bench_with_input(BenchmarkId::new("jpeg", name), &source, |b, img| {
            b.iter(|| black_box(jpeg.encode(img).unwrap()));
        });

        let webp = FrameEncoder::new(width, height, FrameEncoding::default());
        group.bench_with_input(BenchmarkId::new("webp_lossless", name), &source, |b, img| {
            b.iter(|| black_box(webp.encode(img).unwrap()));
        });
    }

    group.finish();
}

fn bench_transport_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("Transport Queue");

    for capacity in [8usize, 50, 500] {
        group.throughput(Throughput::Elements(1000));
        group.bench_with_input(
            BenchmarkId::new("push_drop_oldest_1000", capacity),
            &capacity,
            |b, &cap| {
                b.iter(|| {
                    let queue = TransportQueue::new(cap);
                    for seq in 0..1000u64 {
                        queue.push_drop_oldest(seq);
                    }
                    black_box(queue.dropped())
                });
            },
        );
    }

    group.finish();
}

fn bench_frame_header(c: &mut Criterion) {
    let frame = synthetic_frame(1, 48 * 1024);
    c.bench_function("frame_header_json", |b| {
        b.iter(|| {
            let header = ControlMessage::Frame(FrameHeader::from(black_box(&frame)));
            black_box(header.to_json().unwrap())
        });
    });
}

criterion_group!(
    benches,
    bench_frame_encoding,
    bench_transport_queue,
    bench_frame_header
);
criterion_main!(benches);
