//! Binding of the audio codec to the engine.

use tether_core::audio::command::{self, Command};
use tether_core::audio::descriptor::{self, DESCRIPTOR_SIZE};
use tether_core::audio::{AudioFrame, ErrorCode, Packet};
use tether_core::DecodeError;

use crate::engine::{FrameClass, WireProtocol};
use crate::error::ClientError;

/// Marker type selecting the audio wire format.
pub struct AudioProtocol;

impl WireProtocol for AudioProtocol {
    type Frame = AudioFrame;
    /// The request tag.
    type Key = u32;

    const NAME: &'static str = "audio";
    const HEADER_LEN: usize = DESCRIPTOR_SIZE;

    fn frame_len(head: &[u8]) -> Result<Option<usize>, DecodeError> {
        descriptor::frame_len(head)
    }

    fn decode_frame(bytes: &[u8]) -> Result<AudioFrame, DecodeError> {
        AudioFrame::decode(bytes).map(|(frame, _)| frame)
    }

    fn classify(frame: &AudioFrame) -> FrameClass<u32> {
        match frame {
            AudioFrame::Packet(p) => match p.known_command() {
                Some(Command::Reply) => FrameClass::Reply(p.tag),
                Some(Command::Error) => FrameClass::Error(p.tag),
                _ => FrameClass::Notification,
            },
            AudioFrame::Memblock(_) => FrameClass::Notification,
        }
    }

    fn key_for(counter: u64) -> u32 {
        counter as u32
    }

    fn issued_before(key: u32, first: u32) -> bool {
        let behind = first.wrapping_sub(key);
        behind != 0 && behind <= 0x8000_0000
    }
}

/// Converts an `ERROR` packet into the client error taxonomy.
pub fn server_error(packet: &Packet) -> ClientError {
    match command::decode_error_code(packet) {
        Ok(code) => ClientError::Server {
            code,
            description: ErrorCode::try_from(code)
                .map(ErrorCode::description)
                .unwrap_or("unrecognized error code")
                .to_string(),
            request: packet.tag,
        },
        Err(e) => ClientError::Decode(e),
    }
}
