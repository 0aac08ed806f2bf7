//! Criterion benchmarks for the two frame codecs.
//!
//! The hot paths are event decoding (every input event crosses it) and
//! image chunking (a full-screen upload every frame for software renderers).
//!
//! Run with:
//! ```bash
//! cargo bench --package tether-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tether_core::audio::command::{self, Notification, PlaybackStreamParams};
use tether_core::audio::descriptor::{encode_memblocks, AudioFrame};
use tether_core::audio::tagstruct::{SampleFormat, SampleSpec};
use tether_core::display::codec::{ReplyFrame, ServerFrame, MAX_REQUEST_BYTES};
use tether_core::display::events::{Event, InputEvent};
use tether_core::display::requests::{self, PutImageHeader};
use tether_core::display::{chunking, ImageLayout};

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn motion() -> ServerFrame {
    ServerFrame::Event(Event::MotionNotify(InputEvent {
        detail: 0,
        sequence: 100,
        time: 1_000,
        root: 0x532,
        event: 0x0440_0001,
        child: 0,
        root_x: 640,
        root_y: 360,
        event_x: 40,
        event_y: 60,
        state: 0,
        same_screen: true,
    }))
}

fn stream_params() -> PlaybackStreamParams {
    PlaybackStreamParams::new(
        "bench",
        SampleSpec {
            format: SampleFormat::S16Le,
            channels: 2,
            rate: 44_100,
        },
    )
}

// ── Benchmark groups ──────────────────────────────────────────────────────────

/// Benchmarks decoding of representative display frames.
fn bench_display_decode(c: &mut Criterion) {
    let frames: &[(&str, ServerFrame)] = &[
        ("MotionNotify", motion()),
        ("Reply(32)", ServerFrame::Reply(ReplyFrame::from_parts(0, 1, &[1; 24]))),
        ("Reply(1056)", ServerFrame::Reply(ReplyFrame::from_parts(0, 1, &[1; 1048]))),
    ];

    let mut group = c.benchmark_group("display_decode");
    for (name, frame) in frames {
        let bytes = frame.encode();
        group.bench_with_input(BenchmarkId::new("frame", name), &bytes, |b, bytes| {
            b.iter(|| ServerFrame::decode(black_box(bytes)).expect("decode must succeed"))
        });
    }
    group.finish();
}

/// Benchmarks chunked PutImage encoding for common surface sizes.
fn bench_put_image(c: &mut Criterion) {
    let header = PutImageHeader {
        format: requests::IMAGE_FORMAT_Z_PIXMAP,
        drawable: 1,
        gc: 2,
        width: 0,
        height: 0,
        dst_x: 0,
        dst_y: 0,
        left_pad: 0,
        depth: 24,
    };

    let mut group = c.benchmark_group("put_image_chunked");
    for (w, h) in [(800u16, 600u16), (1920, 1080)] {
        let layout = ImageLayout::packed(w, h, 4);
        let data = vec![0x7F; layout.byte_len()];
        group.bench_function(format!("{w}x{h}"), |b| {
            b.iter(|| {
                chunking::encode_put_image(&header, &layout, black_box(&data), MAX_REQUEST_BYTES)
                    .unwrap()
            })
        });
    }
    group.finish();
}

/// Benchmarks the audio control and data paths.
fn bench_audio(c: &mut Criterion) {
    let mut group = c.benchmark_group("audio");

    let params = stream_params();
    group.bench_function("encode_create_playback_stream_v32", |b| {
        b.iter(|| command::create_playback_stream(black_box(1), black_box(32), &params))
    });

    let request = AudioFrame::Packet(
        Notification::Request {
            channel: 0,
            bytes: 8192,
        }
        .to_packet(),
    )
    .encode();
    group.bench_function("decode_request_notification", |b| {
        b.iter(|| {
            let (frame, _) = AudioFrame::decode(black_box(&request)).unwrap();
            match frame {
                AudioFrame::Packet(p) => Notification::decode(&p).unwrap(),
                AudioFrame::Memblock(_) => unreachable!(),
            }
        })
    });

    let samples = vec![0u8; 44_100 * 4];
    group.bench_function("encode_memblocks_1s", |b| {
        b.iter(|| encode_memblocks(0, black_box(&samples)))
    });

    group.finish();
}

criterion_group!(benches, bench_display_decode, bench_put_image, bench_audio);
criterion_main!(benches);
