//! Integration tests for the tether-core codecs.
//!
//! Every server-side frame shape of both protocols is encoded and decoded
//! back through the public API, and the multi-module paths (setup reply to
//! id allocator, chunk planning to PutImage frames) are exercised together.

use tether_core::audio::command::{
    self, AuthReply, CreatePlaybackStreamReply, ErrorCode, Notification, PlaybackStreamParams,
};
use tether_core::audio::descriptor::{encode_memblocks, AudioFrame, Memblock, Packet};
use tether_core::audio::tagstruct::{SampleFormat, SampleSpec, TagStructWriter};
use tether_core::display::codec::{ErrorFrame, ReplyFrame, ServerFrame, MAX_REQUEST_BYTES};
use tether_core::display::events::{
    ClientMessageEvent, ConfigureEvent, Event, ExposeEvent, FocusEvent, InputEvent, WindowNotify,
};
use tether_core::display::requests::{self, InternAtomReply};
use tether_core::display::setup::{self, SetupOutcome};
use tether_core::display::{chunking, ImageLayout};
use tether_core::ResourceIdAllocator;

fn display_roundtrip(frame: ServerFrame) -> ServerFrame {
    let bytes = frame.encode();
    let (decoded, consumed) = ServerFrame::decode(&bytes).expect("decode must succeed");
    assert_eq!(consumed, bytes.len(), "all bytes must be consumed");
    decoded
}

fn audio_roundtrip(frame: AudioFrame) -> AudioFrame {
    let bytes = frame.encode();
    let (decoded, consumed) = AudioFrame::decode(&bytes).expect("decode must succeed");
    assert_eq!(consumed, bytes.len(), "all bytes must be consumed");
    decoded
}

fn input(detail: u8) -> InputEvent {
    InputEvent {
        detail,
        sequence: 9,
        time: 123_456,
        root: 0x532,
        event: 0x0440_0001,
        child: 0,
        root_x: 300,
        root_y: -20,
        event_x: 10,
        event_y: 20,
        state: 0x0011,
        same_screen: true,
    }
}

// ── Display frames ────────────────────────────────────────────────────────────

#[test]
fn test_roundtrip_error_frame() {
    let original = ServerFrame::Error(ErrorFrame {
        code: 3,
        sequence: 77,
        bad_value: 0x0440_0009,
        minor_opcode: 0,
        major_opcode: 8,
    });
    assert_eq!(original, display_roundtrip(original.clone()));
}

#[test]
fn test_roundtrip_long_reply_frame() {
    let body: Vec<u8> = (0..100u8).collect();
    let original = ServerFrame::Reply(ReplyFrame::from_parts(4, 12, &body));
    let decoded = display_roundtrip(original.clone());
    assert_eq!(original, decoded);
    assert_eq!(decoded.encode().len(), 8 + 100);
}

#[test]
fn test_roundtrip_every_decoded_event() {
    let events = vec![
        Event::KeyPress(input(38)),
        Event::KeyRelease(input(38)),
        Event::ButtonPress(input(1)),
        Event::ButtonRelease(input(3)),
        Event::MotionNotify(input(0)),
        Event::FocusIn(FocusEvent {
            detail: 3,
            sequence: 2,
            event: 0x0440_0001,
            mode: 0,
        }),
        Event::FocusOut(FocusEvent {
            detail: 3,
            sequence: 2,
            event: 0x0440_0001,
            mode: 1,
        }),
        Event::Expose(ExposeEvent {
            sequence: 4,
            window: 0x0440_0001,
            x: 0,
            y: 0,
            width: 640,
            height: 480,
            count: 0,
        }),
        Event::DestroyNotify(WindowNotify {
            sequence: 5,
            event: 0x0440_0001,
            window: 0x0440_0001,
            flag: false,
        }),
        Event::UnmapNotify(WindowNotify {
            sequence: 5,
            event: 0x0440_0001,
            window: 0x0440_0001,
            flag: true,
        }),
        Event::MapNotify(WindowNotify {
            sequence: 5,
            event: 0x0440_0001,
            window: 0x0440_0001,
            flag: false,
        }),
        Event::ConfigureNotify(ConfigureEvent {
            sequence: 6,
            event: 0x0440_0001,
            window: 0x0440_0001,
            above_sibling: 0,
            x: -4,
            y: 12,
            width: 800,
            height: 600,
            border_width: 0,
            override_redirect: false,
        }),
        Event::ClientMessage(ClientMessageEvent {
            format: 32,
            sequence: 7,
            window: 0x0440_0001,
            message_type: 0x10F,
            data: [1; 20],
        }),
    ];
    for event in events {
        let original = ServerFrame::Event(event);
        assert_eq!(original, display_roundtrip(original.clone()));
    }
}

#[test]
fn test_setup_reply_feeds_id_allocator() {
    // Arrange
    let reply = setup::sample_setup().encode();
    let mut header = [0u8; 8];
    header.copy_from_slice(&reply[..8]);

    // Act
    let info = match setup::parse_reply(&header, &reply[8..]).unwrap() {
        SetupOutcome::Success(info) => info,
        other => panic!("expected success, got {other:?}"),
    };
    let ids = ResourceIdAllocator::new(info.resource_id_base, info.resource_id_mask).unwrap();
    let window = ids.generate().unwrap();

    // Assert
    assert_eq!(window & !info.resource_id_mask, info.resource_id_base);
    let map = requests::map_window(window).unwrap();
    assert_eq!(&map[4..8], &window.to_le_bytes());
}

#[test]
fn test_intern_atom_request_and_reply() {
    let request = requests::intern_atom(true, "_NET_WM_NAME").unwrap();
    assert_eq!(request.len(), 20);
    assert_eq!(request[1], 1);

    let reply = ReplyFrame::from_parts(0, 1, &0x0000_0152u32.to_le_bytes());
    let (frame, _) = ServerFrame::decode(&ServerFrame::Reply(reply).encode()).unwrap();
    let ServerFrame::Reply(reply) = frame else {
        panic!("expected reply");
    };
    assert_eq!(InternAtomReply::decode(&reply).unwrap().atom, 0x152);
}

#[test]
fn test_chunked_frames_stay_under_cap() {
    let layout = ImageLayout::packed(1920, 1080, 4);
    let data = vec![0x5A; layout.byte_len()];
    let header = requests::PutImageHeader {
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
    let frames = chunking::encode_put_image(&header, &layout, &data, MAX_REQUEST_BYTES).unwrap();
    let payload: usize = frames
        .iter()
        .inspect(|f| assert!(f.len() <= MAX_REQUEST_BYTES))
        .map(|f| f.len() - requests::PUT_IMAGE_HEADER_SIZE)
        .sum();
    assert_eq!(payload, data.len());
}

// ── Audio frames ──────────────────────────────────────────────────────────────

#[test]
fn test_roundtrip_request_packets() {
    let spec = SampleSpec {
        format: SampleFormat::Float32Le,
        channels: 2,
        rate: 48_000,
    };
    let params = PlaybackStreamParams::new("bench", spec);
    for packet in [
        command::auth(0, &[0u8; 256]),
        command::create_playback_stream(1, 32, &params),
        command::create_playback_stream(2, 12, &params),
        command::cork_playback_stream(3, 0, true),
        command::drain_playback_stream(4, 0),
        command::delete_playback_stream(5, 0),
        command::subscribe(6, command::subscription::SINK_INPUT),
    ] {
        let original = AudioFrame::Packet(packet);
        assert_eq!(original, audio_roundtrip(original.clone()));
    }
}

#[test]
fn test_roundtrip_reply_packets() {
    let auth = AuthReply {
        server_version: 35,
        shm: true,
        memfd: false,
    };
    let error = command::error_reply(9, ErrorCode::NoEntity);
    for packet in [auth.to_packet(0), error] {
        let original = AudioFrame::Packet(packet);
        assert_eq!(original, audio_roundtrip(original.clone()));
    }

    let create = CreatePlaybackStreamReply {
        channel: 1,
        stream_index: 40,
        requested_bytes: 65_536,
        buffer_attr: None,
        placement: None,
        sink_latency_usec: None,
        format: None,
    };
    let AudioFrame::Packet(p) = audio_roundtrip(AudioFrame::Packet(create.to_packet(2, 8))) else {
        panic!("expected packet");
    };
    assert_eq!(CreatePlaybackStreamReply::decode(&p, 8).unwrap(), create);
}

#[test]
fn test_roundtrip_notification_packets() {
    let n = Notification::Request {
        channel: 1,
        bytes: 4096,
    };
    let AudioFrame::Packet(p) = audio_roundtrip(AudioFrame::Packet(n.to_packet())) else {
        panic!("expected packet");
    };
    assert_eq!(p.tag, command::NOTIFICATION_TAG);
    assert_eq!(Notification::decode(&p).unwrap(), n);
}

#[test]
fn test_roundtrip_memblock_frames() {
    let data: Vec<u8> = (0..200_000u32).map(|i| (i % 256) as u8).collect();
    let mut rebuilt = Vec::new();
    for bytes in encode_memblocks(7, &data) {
        let (frame, used) = AudioFrame::decode(&bytes).unwrap();
        assert_eq!(used, bytes.len());
        match frame {
            AudioFrame::Memblock(Memblock { channel, data, .. }) => {
                assert_eq!(channel, 7);
                rebuilt.extend_from_slice(&data);
            }
            other => panic!("expected memblock, got {other:?}"),
        }
    }
    assert_eq!(rebuilt, data);
}

#[test]
fn test_concatenated_frames_decode_in_order() {
    // Arrange – two packets back to back in one buffer
    let first = Packet::new(command::Command::Reply, 1, TagStructWriter::new());
    let second = Notification::Started { channel: 2 }.to_packet();
    let mut stream = AudioFrame::Packet(first.clone()).encode();
    stream.extend_from_slice(&AudioFrame::Packet(second.clone()).encode());

    // Act
    let (a, used) = AudioFrame::decode(&stream).unwrap();
    let (b, rest) = AudioFrame::decode(&stream[used..]).unwrap();

    // Assert
    assert_eq!(a, AudioFrame::Packet(first));
    assert_eq!(b, AudioFrame::Packet(second));
    assert_eq!(used + rest, stream.len());
}
