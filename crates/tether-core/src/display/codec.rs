//! Positional frame codec: request building, little-endian field reading,
//! and the error/reply/event split of server frames.
//!
//! Every server frame is classified exactly once, here, by its first byte:
//!
//! | byte 0        | frame                                |
//! |---------------|--------------------------------------|
//! | `0`           | error (32 bytes)                     |
//! | `1`           | reply (32 + 4·length bytes)          |
//! | `35`          | generic event (32 + 4·length bytes)  |
//! | anything else | event (32 bytes, bit 7 = sent event) |

use crate::display::events::Event;
use crate::error::{require_len, DecodeError, EncodeError};

// ── Wire constants ────────────────────────────────────────────────────────────

/// Every request is padded to a multiple of this many bytes.
pub const ALIGNMENT: usize = 4;

/// Size of an error, an event, and the fixed part of a reply.
pub const FRAME_SIZE: usize = 32;

/// First byte of an error frame.
pub const KIND_ERROR: u8 = 0;

/// First byte of a reply frame.
pub const KIND_REPLY: u8 = 1;

/// Event code of a generic (extension, variable-length) event.
pub const KIND_GENERIC_EVENT: u8 = 35;

/// Set on events that were forwarded by another client.
pub const SENT_EVENT_BIT: u8 = 0x80;

/// Largest request the 16-bit length field can describe, in bytes.
pub const MAX_REQUEST_BYTES: usize = u16::MAX as usize * ALIGNMENT;

/// Bytes needed to bring `len` up to the next 4-byte boundary.
pub fn pad(len: usize) -> usize {
    (ALIGNMENT - len % ALIGNMENT) % ALIGNMENT
}

/// `len` rounded up to the next 4-byte boundary.
pub fn padded(len: usize) -> usize {
    len + pad(len)
}

// ── Request building ──────────────────────────────────────────────────────────

/// Builds one request frame.
///
/// The first four bytes are `[opcode][data][length:2]`; the length is filled
/// in by [`finish`](Self::finish) once every field has been appended.
///
/// ```rust
/// use tether_core::display::RequestBuilder;
///
/// let mut req = RequestBuilder::new(8, 0); // MapWindow
/// req.u32(0x0040_0001);
/// assert_eq!(req.finish().unwrap(), vec![8, 0, 2, 0, 0x01, 0, 0x40, 0]);
/// ```
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    buf: Vec<u8>,
}

impl RequestBuilder {
    /// Starts a request with the given major opcode and data byte.
    pub fn new(opcode: u8, data: u8) -> Self {
        let mut buf = Vec::with_capacity(32);
        buf.extend_from_slice(&[opcode, data, 0, 0]);
        Self { buf }
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn i16(&mut self, v: i16) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    /// Appends `n` zero bytes of explicit "unused" space.
    pub fn unused(&mut self, n: usize) -> &mut Self {
        self.buf.resize(self.buf.len() + n, 0);
        self
    }

    /// Appends raw bytes followed by padding to the next 4-byte boundary.
    pub fn bytes_padded(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(data);
        self.unused(pad(data.len()))
    }

    /// Current length in bytes, before final padding.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Pads the request, writes the word-count length field, and returns the
    /// finished frame.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::RequestTooLarge`] when the padded request does
    /// not fit the 16-bit length field.
    pub fn finish(mut self) -> Result<Vec<u8>, EncodeError> {
        let len = padded(self.buf.len());
        if len > MAX_REQUEST_BYTES {
            return Err(EncodeError::RequestTooLarge {
                size: len,
                max: MAX_REQUEST_BYTES,
            });
        }
        self.buf.resize(len, 0);
        let words = (len / ALIGNMENT) as u16;
        self.buf[2..4].copy_from_slice(&words.to_le_bytes());
        Ok(self.buf)
    }
}

// ── Field reading ─────────────────────────────────────────────────────────────

/// Bounds-checked little-endian cursor over a server frame.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Starts reading at `offset` into `buf`.
    pub fn at(buf: &'a [u8], offset: usize) -> Self {
        Self { buf, pos: offset }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// Returns the next `n` bytes and advances past them.
    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        require_len(self.buf, self.pos + n)?;
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), DecodeError> {
        self.bytes(n).map(|_| ())
    }

    /// Skips the padding that follows an `n`-byte variable-length field.
    pub fn skip_pad(&mut self, n: usize) -> Result<(), DecodeError> {
        self.skip(pad(n))
    }

    pub fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.bytes(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, DecodeError> {
        let b = self.bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn i16(&mut self) -> Result<i16, DecodeError> {
        let b = self.bytes(2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32, DecodeError> {
        let b = self.bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

// ── Server frames ─────────────────────────────────────────────────────────────

/// An error frame: the server rejected one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorFrame {
    pub code: u8,
    pub sequence: u16,
    /// The offending resource id, atom, or value, depending on `code`.
    pub bad_value: u32,
    pub minor_opcode: u16,
    pub major_opcode: u8,
}

impl ErrorFrame {
    /// Human-readable name of the core error codes.
    pub fn name(&self) -> &'static str {
        match self.code {
            1 => "Request",
            2 => "Value",
            3 => "Window",
            4 => "Pixmap",
            5 => "Atom",
            6 => "Cursor",
            7 => "Font",
            8 => "Match",
            9 => "Drawable",
            10 => "Access",
            11 => "Alloc",
            12 => "Colormap",
            13 => "GContext",
            14 => "IDChoice",
            15 => "Name",
            16 => "Length",
            17 => "Implementation",
            _ => "Extension",
        }
    }

    fn decode(b: &[u8]) -> Result<Self, DecodeError> {
        let mut r = WireReader::at(b, 1);
        let code = r.u8()?;
        let sequence = r.u16()?;
        let bad_value = r.u32()?;
        let minor_opcode = r.u16()?;
        let major_opcode = r.u8()?;
        Ok(Self {
            code,
            sequence,
            bad_value,
            minor_opcode,
            major_opcode,
        })
    }

    fn encode(&self) -> Vec<u8> {
        let mut b = vec![0u8; FRAME_SIZE];
        b[0] = KIND_ERROR;
        b[1] = self.code;
        b[2..4].copy_from_slice(&self.sequence.to_le_bytes());
        b[4..8].copy_from_slice(&self.bad_value.to_le_bytes());
        b[8..10].copy_from_slice(&self.minor_opcode.to_le_bytes());
        b[10] = self.major_opcode;
        b
    }
}

/// A reply frame, kept as raw bytes so each request's reply decoder can read
/// its own fields at their documented offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyFrame {
    bytes: Vec<u8>,
}

impl ReplyFrame {
    /// Builds a reply from its detail byte, sequence number, and the bytes
    /// from offset 8 onwards.  `body` is padded to at least 24 bytes and to a
    /// 4-byte boundary.
    pub fn from_parts(detail: u8, sequence: u16, body: &[u8]) -> Self {
        let body_len = padded(body.len().max(FRAME_SIZE - 8));
        let extra_words = ((body_len - (FRAME_SIZE - 8)) / ALIGNMENT) as u32;
        let mut bytes = Vec::with_capacity(8 + body_len);
        bytes.push(KIND_REPLY);
        bytes.push(detail);
        bytes.extend_from_slice(&sequence.to_le_bytes());
        bytes.extend_from_slice(&extra_words.to_le_bytes());
        bytes.extend_from_slice(body);
        bytes.resize(8 + body_len, 0);
        Self { bytes }
    }

    /// The one-byte field at offset 1, used by some replies for a value.
    pub fn detail(&self) -> u8 {
        self.bytes[1]
    }

    pub fn sequence(&self) -> u16 {
        u16::from_le_bytes([self.bytes[2], self.bytes[3]])
    }

    /// Full frame bytes, header included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// A reader positioned at `offset` within the full frame.
    pub fn reader_at(&self, offset: usize) -> WireReader<'_> {
        WireReader::at(&self.bytes, offset)
    }
}

/// One server-to-client frame, classified at the frame boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFrame {
    Error(ErrorFrame),
    Reply(ReplyFrame),
    Event(Event),
}

impl ServerFrame {
    /// The sequence number of the last request the server processed when it
    /// produced this frame, where the frame carries one.
    pub fn sequence(&self) -> Option<u16> {
        match self {
            ServerFrame::Error(e) => Some(e.sequence),
            ServerFrame::Reply(r) => Some(r.sequence()),
            ServerFrame::Event(e) => e.sequence(),
        }
    }

    /// Decodes one frame from the start of `bytes`.
    ///
    /// Returns the frame and the number of bytes consumed.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InsufficientData`] when `bytes` does not yet
    /// hold the whole frame; callers that stream bytes should use
    /// [`frame_len`] first.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), DecodeError> {
        let total = match frame_len(bytes)? {
            Some(n) => n,
            None => {
                return Err(DecodeError::InsufficientData {
                    needed: FRAME_SIZE,
                    available: bytes.len(),
                })
            }
        };
        require_len(bytes, total)?;
        let frame = &bytes[..total];
        let decoded = match frame[0] {
            KIND_ERROR => ServerFrame::Error(ErrorFrame::decode(frame)?),
            KIND_REPLY => ServerFrame::Reply(ReplyFrame {
                bytes: frame.to_vec(),
            }),
            _ => ServerFrame::Event(Event::decode(frame)?),
        };
        Ok((decoded, total))
    }

    /// Encodes the frame exactly as a server would send it.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            ServerFrame::Error(e) => e.encode(),
            ServerFrame::Reply(r) => r.bytes.clone(),
            ServerFrame::Event(e) => e.encode(),
        }
    }
}

/// Total length of the frame starting at `head`, or `None` if fewer than 32
/// bytes are available to tell.
///
/// # Errors
///
/// Returns [`DecodeError::Malformed`] if a declared reply length would
/// overflow `usize`.
pub fn frame_len(head: &[u8]) -> Result<Option<usize>, DecodeError> {
    if head.len() < FRAME_SIZE {
        return Ok(None);
    }
    let kind = head[0] & !SENT_EVENT_BIT;
    let extended = head[0] == KIND_REPLY || kind == KIND_GENERIC_EVENT;
    if !extended {
        return Ok(Some(FRAME_SIZE));
    }
    let words = u32::from_le_bytes([head[4], head[5], head[6], head[7]]) as usize;
    words
        .checked_mul(ALIGNMENT)
        .and_then(|extra| extra.checked_add(FRAME_SIZE))
        .map(Some)
        .ok_or_else(|| DecodeError::Malformed(format!("reply length {words} overflows")))
}
