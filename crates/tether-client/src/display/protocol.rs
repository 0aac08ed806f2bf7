//! Binding of the display codec to the engine.

use tether_core::display::codec::{self, ErrorFrame, FRAME_SIZE};
use tether_core::{DecodeError, ServerFrame};

use crate::engine::{FrameClass, WireProtocol};
use crate::error::ClientError;

/// Marker type selecting the display wire format.
pub struct DisplayProtocol;

impl WireProtocol for DisplayProtocol {
    type Frame = ServerFrame;
    /// Low 16 bits of the request counter.
    type Key = u16;

    const NAME: &'static str = "display";
    const HEADER_LEN: usize = FRAME_SIZE;

    fn frame_len(head: &[u8]) -> Result<Option<usize>, DecodeError> {
        codec::frame_len(head)
    }

    fn decode_frame(bytes: &[u8]) -> Result<ServerFrame, DecodeError> {
        ServerFrame::decode(bytes).map(|(frame, _)| frame)
    }

    fn classify(frame: &ServerFrame) -> FrameClass<u16> {
        match frame {
            ServerFrame::Reply(r) => FrameClass::Reply(r.sequence()),
            ServerFrame::Error(e) => FrameClass::Error(e.sequence),
            ServerFrame::Event(_) => FrameClass::Notification,
        }
    }

    fn key_for(counter: u64) -> u16 {
        counter as u16
    }

    fn issued_before(key: u16, first: u16) -> bool {
        let behind = first.wrapping_sub(key);
        behind != 0 && behind <= 0x8000
    }
}

/// Converts a display error frame into the client error taxonomy.
pub fn server_error(e: &ErrorFrame) -> ClientError {
    ClientError::Server {
        code: e.code as u32,
        description: format!(
            "{} (opcode {}.{}, value {:#x})",
            e.name(),
            e.major_opcode,
            e.minor_opcode,
            e.bad_value
        ),
        request: e.sequence as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::display::codec::ReplyFrame;

    #[test]
    fn test_classification() {
        let reply = ServerFrame::Reply(ReplyFrame::from_parts(0, 0x1234, &[0; 24]));
        let error = ServerFrame::Error(ErrorFrame {
            code: 3,
            sequence: 9,
            bad_value: 0,
            minor_opcode: 0,
            major_opcode: 8,
        });
        assert_eq!(DisplayProtocol::classify(&reply), FrameClass::Reply(0x1234));
        assert_eq!(DisplayProtocol::classify(&error), FrameClass::Error(9));
    }

    #[test]
    fn test_key_wraps_at_sixteen_bits() {
        assert_eq!(DisplayProtocol::key_for(0x1_0005), 5);
    }

    #[test]
    fn test_issued_before_compares_across_the_wrap() {
        assert!(DisplayProtocol::issued_before(4, 5));
        assert!(DisplayProtocol::issued_before(0xFFFF, 0x0002));
        assert!(!DisplayProtocol::issued_before(5, 5));
        assert!(!DisplayProtocol::issued_before(0x0002, 0xFFFF));
        assert!(!DisplayProtocol::issued_before(9, 5));
    }

    #[test]
    fn test_server_error_carries_sequence_and_name() {
        let e = ErrorFrame {
            code: 3,
            sequence: 42,
            bad_value: 0x0440_0001,
            minor_opcode: 0,
            major_opcode: 8,
        };
        match server_error(&e) {
            ClientError::Server {
                code,
                description,
                request,
            } => {
                assert_eq!((code, request), (3, 42));
                assert!(description.starts_with(e.name()));
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }
}
