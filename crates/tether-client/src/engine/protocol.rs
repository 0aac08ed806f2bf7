//! The seam between the generic engine and a concrete wire protocol.

use std::fmt;
use std::marker::PhantomData;

use bytes::BytesMut;
use tether_core::DecodeError;
use tokio_util::codec::Decoder;

use crate::error::ClientError;

/// How the demultiplexer routes one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameClass<K> {
    /// The answer to the request identified by the key.
    Reply(K),
    /// A failure report for the request identified by the key.
    ///
    /// Unlike a reply, an error may legitimately arrive for a request nobody
    /// is waiting on (one that produces no reply on success).
    Error(K),
    /// Anything the server sends unprompted.
    Notification,
}

/// What the engine needs to know about a protocol.
pub trait WireProtocol: Send + Sync + 'static {
    type Frame: fmt::Debug + Send + 'static;
    /// Value carried by a reply that identifies its request.
    type Key: Copy + Eq + fmt::Debug + Send + Sync + 'static;

    /// Short name used in log fields.
    const NAME: &'static str;

    /// Number of bytes needed before [`frame_len`](Self::frame_len) can
    /// answer.
    const HEADER_LEN: usize;

    /// Total length of the frame starting at `head`, or `None` if `head` is
    /// shorter than the header.  An error here means the byte stream cannot
    /// be resynchronised.
    fn frame_len(head: &[u8]) -> Result<Option<usize>, DecodeError>;

    /// Decodes one complete frame.
    fn decode_frame(bytes: &[u8]) -> Result<Self::Frame, DecodeError>;

    fn classify(frame: &Self::Frame) -> FrameClass<Self::Key>;

    /// The key a reply to the `counter`-th request will carry.
    fn key_for(counter: u64) -> Self::Key;

    /// Whether `key` belongs to a request written before the one keyed
    /// `first`.  Keys wrap, so "before" means within half the key space
    /// behind `first`.
    fn issued_before(key: Self::Key, first: Self::Key) -> bool;
}

/// Splits the inbound byte stream into frames of `P`.
///
/// Framing errors are fatal and end the stream.  Content errors are yielded
/// as items after the frame's bytes have been consumed, so the next read
/// starts at the next frame boundary.
pub struct FrameCodec<P> {
    _protocol: PhantomData<fn() -> P>,
}

impl<P> FrameCodec<P> {
    pub fn new() -> Self {
        Self {
            _protocol: PhantomData,
        }
    }
}

impl<P> Default for FrameCodec<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: WireProtocol> Decoder for FrameCodec<P> {
    type Item = Result<P::Frame, DecodeError>;
    type Error = ClientError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(total) = P::frame_len(src)? else {
            src.reserve(P::HEADER_LEN.saturating_sub(src.len()));
            return Ok(None);
        };
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }
        let bytes = src.split_to(total);
        Ok(Some(P::decode_frame(&bytes)))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! A two-byte toy protocol for exercising the engine without either real
    //! codec.
    //!
    //! ```text
    //! [kind:1][key:1]   kind 0 = error, 1 = reply, 2 = notification
    //! ```
    //!
    //! Kind `0xEE` is a well-framed frame whose content fails to decode;
    //! kind `0xFF` is a framing error.

    use super::*;

    pub const ERROR: u8 = 0;
    pub const REPLY: u8 = 1;
    pub const NOTE: u8 = 2;
    pub const GARBLED: u8 = 0xEE;
    pub const UNFRAMEABLE: u8 = 0xFF;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Toy {
        pub kind: u8,
        pub key: u8,
    }

    pub struct ToyProtocol;

    impl WireProtocol for ToyProtocol {
        type Frame = Toy;
        type Key = u8;
        const NAME: &'static str = "toy";
        const HEADER_LEN: usize = 2;

        fn frame_len(head: &[u8]) -> Result<Option<usize>, DecodeError> {
            match head {
                [] | [_] => Ok(None),
                [UNFRAMEABLE, ..] => Err(DecodeError::Malformed("unframeable".into())),
                _ => Ok(Some(2)),
            }
        }

        fn decode_frame(bytes: &[u8]) -> Result<Toy, DecodeError> {
            match bytes[0] {
                ERROR | REPLY | NOTE => Ok(Toy {
                    kind: bytes[0],
                    key: bytes[1],
                }),
                other => Err(DecodeError::UnknownDiscriminant {
                    what: "toy kind",
                    value: other as u32,
                }),
            }
        }

        fn classify(frame: &Toy) -> FrameClass<u8> {
            match frame.kind {
                ERROR => FrameClass::Error(frame.key),
                REPLY => FrameClass::Reply(frame.key),
                _ => FrameClass::Notification,
            }
        }

        fn key_for(counter: u64) -> u8 {
            counter as u8
        }

        fn issued_before(key: u8, first: u8) -> bool {
            let behind = first.wrapping_sub(key);
            behind != 0 && behind <= 0x80
        }
    }

    pub fn bytes(kind: u8, key: u8) -> [u8; 2] {
        [kind, key]
    }
}
