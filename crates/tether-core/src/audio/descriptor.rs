//! The 20-byte frame descriptor and the two frame kinds it introduces.
//!
//! ```text
//! [length:4][channel:4][offset_hi:4][offset_lo:4][flags:4]   (big-endian)
//! ```
//!
//! A descriptor on the control channel (`0xFFFFFFFF`) is followed by a
//! packet of tagged values: command, tag, then the command's arguments.  Any
//! other channel number names a playback stream and is followed by raw
//! sample bytes (a "memblock"), with the offset fields carrying a seek offset
//! and the low flag bits a seek mode.

use crate::audio::command::Command;
use crate::audio::tagstruct::{TagStructReader, TagStructWriter};
use crate::error::{require_len, DecodeError};

pub const DESCRIPTOR_SIZE: usize = 20;

/// Channel number of control packets.
pub const CONTROL_CHANNEL: u32 = u32::MAX;

/// Largest payload the server accepts in one frame.
pub const MAX_FRAME_PAYLOAD: usize = 16 * 1024 * 1024;

/// Sample data is split into memblock frames of at most this many bytes.
pub const MEMBLOCK_CHUNK: usize = 64 * 1024;

/// Seek mode: write relative to the current write index.
pub const SEEK_RELATIVE: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub length: u32,
    pub channel: u32,
    pub offset_hi: u32,
    pub offset_lo: u32,
    pub flags: u32,
}

impl Descriptor {
    pub fn control(length: u32) -> Self {
        Self {
            length,
            channel: CONTROL_CHANNEL,
            offset_hi: 0,
            offset_lo: 0,
            flags: 0,
        }
    }

    pub fn is_control(&self) -> bool {
        self.channel == CONTROL_CHANNEL
    }

    pub fn seek_offset(&self) -> i64 {
        (((self.offset_hi as u64) << 32) | self.offset_lo as u64) as i64
    }

    pub fn encode(&self) -> [u8; DESCRIPTOR_SIZE] {
        let mut b = [0u8; DESCRIPTOR_SIZE];
        for (i, v) in [
            self.length,
            self.channel,
            self.offset_hi,
            self.offset_lo,
            self.flags,
        ]
        .into_iter()
        .enumerate()
        {
            b[i * 4..i * 4 + 4].copy_from_slice(&v.to_be_bytes());
        }
        b
    }

    pub fn decode(b: &[u8]) -> Result<Self, DecodeError> {
        require_len(b, DESCRIPTOR_SIZE)?;
        let word = |i: usize| u32::from_be_bytes([b[i], b[i + 1], b[i + 2], b[i + 3]]);
        Ok(Self {
            length: word(0),
            channel: word(4),
            offset_hi: word(8),
            offset_lo: word(12),
            flags: word(16),
        })
    }
}

/// Total length of the frame starting at `head`, or `None` until a whole
/// descriptor is available.
///
/// # Errors
///
/// Returns [`DecodeError::Malformed`] when the declared payload exceeds
/// [`MAX_FRAME_PAYLOAD`]; such a stream cannot be resynchronised.
pub fn frame_len(head: &[u8]) -> Result<Option<usize>, DecodeError> {
    if head.len() < DESCRIPTOR_SIZE {
        return Ok(None);
    }
    let length = u32::from_be_bytes([head[0], head[1], head[2], head[3]]) as usize;
    if length > MAX_FRAME_PAYLOAD {
        return Err(DecodeError::Malformed(format!(
            "frame payload of {length} bytes exceeds {MAX_FRAME_PAYLOAD}"
        )));
    }
    Ok(Some(DESCRIPTOR_SIZE + length))
}

// ── Frames ────────────────────────────────────────────────────────────────────

/// A control packet: command code, request tag, and the tagged arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub command: u32,
    pub tag: u32,
    /// Tagged values following the command and tag.
    pub body: Vec<u8>,
}

impl Packet {
    pub fn new(command: Command, tag: u32, body: TagStructWriter) -> Self {
        Self {
            command: command as u32,
            tag,
            body: body.into_bytes(),
        }
    }

    /// The command, if it is one this client knows.
    pub fn known_command(&self) -> Option<Command> {
        Command::try_from(self.command).ok()
    }

    /// A reader over the arguments.
    pub fn reader(&self) -> TagStructReader<'_> {
        TagStructReader::new(&self.body)
    }

    /// The packet's tagged payload (command, tag, arguments).
    pub fn encode_payload(&self) -> Vec<u8> {
        let mut head = TagStructWriter::new();
        head.put_u32(self.command).put_u32(self.tag);
        let mut payload = head.into_bytes();
        payload.extend_from_slice(&self.body);
        payload
    }

    pub fn decode_payload(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = TagStructReader::new(payload);
        let command = r.get_u32()?;
        let tag = r.get_u32()?;
        let consumed = payload.len() - r.remaining();
        Ok(Self {
            command,
            tag,
            body: payload[consumed..].to_vec(),
        })
    }
}

/// Raw samples for one playback stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memblock {
    pub channel: u32,
    pub seek_offset: i64,
    pub flags: u32,
    pub data: Vec<u8>,
}

/// One server or client frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioFrame {
    Packet(Packet),
    Memblock(Memblock),
}

impl AudioFrame {
    /// Decodes one frame from the start of `bytes`, returning it and the
    /// number of bytes consumed.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), DecodeError> {
        let total = frame_len(bytes)?.ok_or(DecodeError::InsufficientData {
            needed: DESCRIPTOR_SIZE,
            available: bytes.len(),
        })?;
        require_len(bytes, total)?;
        let desc = Descriptor::decode(bytes)?;
        let payload = &bytes[DESCRIPTOR_SIZE..total];
        let frame = if desc.is_control() {
            AudioFrame::Packet(Packet::decode_payload(payload)?)
        } else {
            AudioFrame::Memblock(Memblock {
                channel: desc.channel,
                seek_offset: desc.seek_offset(),
                flags: desc.flags,
                data: payload.to_vec(),
            })
        };
        Ok((frame, total))
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            AudioFrame::Packet(p) => encode_packet(p),
            AudioFrame::Memblock(m) => {
                let offset = m.seek_offset as u64;
                let desc = Descriptor {
                    length: m.data.len() as u32,
                    channel: m.channel,
                    offset_hi: (offset >> 32) as u32,
                    offset_lo: offset as u32,
                    flags: m.flags,
                };
                let mut out = Vec::with_capacity(DESCRIPTOR_SIZE + m.data.len());
                out.extend_from_slice(&desc.encode());
                out.extend_from_slice(&m.data);
                out
            }
        }
    }
}

/// Descriptor plus payload for a control packet.
pub fn encode_packet(packet: &Packet) -> Vec<u8> {
    let payload = packet.encode_payload();
    let mut out = Vec::with_capacity(DESCRIPTOR_SIZE + payload.len());
    out.extend_from_slice(&Descriptor::control(payload.len() as u32).encode());
    out.extend_from_slice(&payload);
    out
}

/// Splits `data` into memblock frames for `channel`, each at most
/// [`MEMBLOCK_CHUNK`] bytes of samples, with relative seeking.
pub fn encode_memblocks(channel: u32, data: &[u8]) -> Vec<Vec<u8>> {
    data.chunks(MEMBLOCK_CHUNK)
        .map(|chunk| {
            AudioFrame::Memblock(Memblock {
                channel,
                seek_offset: 0,
                flags: SEEK_RELATIVE,
                data: chunk.to_vec(),
            })
            .encode()
        })
        .collect()
}
