//! Scripted fake servers for the integration tests.
//!
//! Each fake holds the server end of a `UnixStream::pair` and reads and
//! writes whole frames, so a test can play the server's side of an exchange
//! step by step.

#![allow(dead_code)]

use tether_core::audio::descriptor::{encode_packet, AudioFrame, Packet, DESCRIPTOR_SIZE};
use tether_core::display::codec::{padded, ReplyFrame, ServerFrame};
use tether_core::display::setup::SetupInfo;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

// ── Display ───────────────────────────────────────────────────────────────────

pub struct FakeDisplay {
    pub stream: UnixStream,
}

impl FakeDisplay {
    /// Reads the client's preamble and returns the credential name and data.
    pub async fn read_preamble(&mut self) -> (Vec<u8>, Vec<u8>) {
        let mut head = [0u8; 12];
        self.stream.read_exact(&mut head).await.unwrap();
        assert_eq!(head[0], b'l', "client must declare little-endian");
        let name_len = u16::from_le_bytes([head[6], head[7]]) as usize;
        let data_len = u16::from_le_bytes([head[8], head[9]]) as usize;
        let mut name = vec![0u8; padded(name_len)];
        self.stream.read_exact(&mut name).await.unwrap();
        let mut data = vec![0u8; padded(data_len)];
        self.stream.read_exact(&mut data).await.unwrap();
        name.truncate(name_len);
        data.truncate(data_len);
        (name, data)
    }

    pub async fn accept(&mut self, setup: &SetupInfo) {
        self.read_preamble().await;
        self.stream.write_all(&setup.encode()).await.unwrap();
    }

    /// Reads one request, using the length field in its header.
    pub async fn read_request(&mut self) -> Vec<u8> {
        let mut head = [0u8; 4];
        self.stream.read_exact(&mut head).await.unwrap();
        let words = u16::from_le_bytes([head[2], head[3]]) as usize;
        let mut request = head.to_vec();
        request.resize(words * 4, 0);
        self.stream.read_exact(&mut request[4..]).await.unwrap();
        request
    }

    pub async fn send(&mut self, frame: &ServerFrame) {
        self.stream.write_all(&frame.encode()).await.unwrap();
    }

    pub async fn reply(&mut self, reply: ReplyFrame) {
        self.send(&ServerFrame::Reply(reply)).await;
    }
}

pub fn display_pair() -> (UnixStream, FakeDisplay) {
    let (client, server) = UnixStream::pair().unwrap();
    (client, FakeDisplay { stream: server })
}

// ── Audio ─────────────────────────────────────────────────────────────────────

pub struct FakeAudio {
    pub stream: UnixStream,
}

impl FakeAudio {
    pub async fn read_frame(&mut self) -> AudioFrame {
        let mut bytes = vec![0u8; DESCRIPTOR_SIZE];
        self.stream.read_exact(&mut bytes).await.unwrap();
        let len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        bytes.resize(DESCRIPTOR_SIZE + len, 0);
        self.stream
            .read_exact(&mut bytes[DESCRIPTOR_SIZE..])
            .await
            .unwrap();
        AudioFrame::decode(&bytes).unwrap().0
    }

    pub async fn read_packet(&mut self) -> Packet {
        match self.read_frame().await {
            AudioFrame::Packet(p) => p,
            other => panic!("expected a control packet, got {other:?}"),
        }
    }

    pub async fn send(&mut self, packet: &Packet) {
        self.stream.write_all(&encode_packet(packet)).await.unwrap();
    }
}

pub fn audio_pair() -> (UnixStream, FakeAudio) {
    let (client, server) = UnixStream::pair().unwrap();
    (client, FakeAudio { stream: server })
}
