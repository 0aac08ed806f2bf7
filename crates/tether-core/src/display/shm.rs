//! MIT-SHM: pixel transfer through a shared-memory segment.
//!
//! Extension requests use the major opcode returned by QueryExtension and put
//! their minor opcode in the data byte.  The completion event code is the
//! extension's `first_event`.

use crate::display::codec::{ReplyFrame, RequestBuilder, WireReader, FRAME_SIZE, SENT_EVENT_BIT};
use crate::display::events::Event;
use crate::error::{DecodeError, EncodeError};

pub const EXTENSION_NAME: &str = "MIT-SHM";

pub const QUERY_VERSION: u8 = 0;
pub const ATTACH: u8 = 1;
pub const DETACH: u8 = 2;
pub const PUT_IMAGE: u8 = 3;

/// Offset of the completion event from the extension's first event code.
pub const COMPLETION_EVENT_OFFSET: u8 = 0;

pub const PUT_IMAGE_SIZE: usize = 40;

pub fn query_version(major_opcode: u8) -> Result<Vec<u8>, EncodeError> {
    RequestBuilder::new(major_opcode, QUERY_VERSION).finish()
}

/// Registers OS segment `shmid` with the server under resource id `shmseg`.
pub fn attach(
    major_opcode: u8,
    shmseg: u32,
    shmid: u32,
    read_only: bool,
) -> Result<Vec<u8>, EncodeError> {
    let mut req = RequestBuilder::new(major_opcode, ATTACH);
    req.u32(shmseg).u32(shmid).u8(read_only as u8).unused(3);
    req.finish()
}

pub fn detach(major_opcode: u8, shmseg: u32) -> Result<Vec<u8>, EncodeError> {
    let mut req = RequestBuilder::new(major_opcode, DETACH);
    req.u32(shmseg);
    req.finish()
}

/// A PutImage whose pixels are read by the server from an attached segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShmPutImage {
    pub drawable: u32,
    pub gc: u32,
    /// Dimensions of the whole image stored in the segment.
    pub total_width: u16,
    pub total_height: u16,
    pub src_x: u16,
    pub src_y: u16,
    pub src_width: u16,
    pub src_height: u16,
    pub dst_x: i16,
    pub dst_y: i16,
    pub depth: u8,
    pub format: u8,
    /// Ask for a completion event once the server has read the segment.
    pub send_event: bool,
    pub shmseg: u32,
    /// Byte offset of the image within the segment.
    pub offset: u32,
}

pub fn put_image(major_opcode: u8, p: &ShmPutImage) -> Result<Vec<u8>, EncodeError> {
    let mut req = RequestBuilder::new(major_opcode, PUT_IMAGE);
    req.u32(p.drawable)
        .u32(p.gc)
        .u16(p.total_width)
        .u16(p.total_height)
        .u16(p.src_x)
        .u16(p.src_y)
        .u16(p.src_width)
        .u16(p.src_height)
        .i16(p.dst_x)
        .i16(p.dst_y)
        .u8(p.depth)
        .u8(p.format)
        .u8(p.send_event as u8)
        .unused(1)
        .u32(p.shmseg)
        .u32(p.offset);
    req.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryVersionReply {
    pub shared_pixmaps: bool,
    pub major_version: u16,
    pub minor_version: u16,
    pub uid: u16,
    pub gid: u16,
    pub pixmap_format: u8,
}

impl QueryVersionReply {
    pub fn decode(reply: &ReplyFrame) -> Result<Self, DecodeError> {
        let mut r = reply.reader_at(8);
        Ok(Self {
            shared_pixmaps: reply.detail() != 0,
            major_version: r.u16()?,
            minor_version: r.u16()?,
            uid: r.u16()?,
            gid: r.u16()?,
            pixmap_format: r.u8()?,
        })
    }

    pub fn to_reply(&self, sequence: u16) -> ReplyFrame {
        let mut body = Vec::with_capacity(9);
        body.extend_from_slice(&self.major_version.to_le_bytes());
        body.extend_from_slice(&self.minor_version.to_le_bytes());
        body.extend_from_slice(&self.uid.to_le_bytes());
        body.extend_from_slice(&self.gid.to_le_bytes());
        body.push(self.pixmap_format);
        ReplyFrame::from_parts(self.shared_pixmaps as u8, sequence, &body)
    }
}

/// Sent when the server has finished reading a segment for a PutImage with
/// `send_event` set.  The segment may be rewritten after this arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionEvent {
    pub sequence: u16,
    pub drawable: u32,
    pub minor_event: u16,
    pub major_event: u8,
    pub shmseg: u32,
    pub offset: u32,
}

impl CompletionEvent {
    /// Recognises a completion among the events the core decoder left as
    /// [`Event::Unknown`].
    pub fn from_event(event: &Event, first_event: u8) -> Option<Self> {
        match event {
            Event::Unknown { code, raw }
                if code & !SENT_EVENT_BIT == first_event.wrapping_add(COMPLETION_EVENT_OFFSET) =>
            {
                Self::decode(raw).ok()
            }
            _ => None,
        }
    }

    pub fn decode(b: &[u8]) -> Result<Self, DecodeError> {
        let mut r = WireReader::at(b, 2);
        let sequence = r.u16()?;
        let drawable = r.u32()?;
        let minor_event = r.u16()?;
        let major_event = r.u8()?;
        r.skip(1)?;
        Ok(Self {
            sequence,
            drawable,
            minor_event,
            major_event,
            shmseg: r.u32()?,
            offset: r.u32()?,
        })
    }

    pub fn encode(&self, first_event: u8) -> Vec<u8> {
        let mut b = vec![0u8; FRAME_SIZE];
        b[0] = first_event.wrapping_add(COMPLETION_EVENT_OFFSET);
        b[2..4].copy_from_slice(&self.sequence.to_le_bytes());
        b[4..8].copy_from_slice(&self.drawable.to_le_bytes());
        b[8..10].copy_from_slice(&self.minor_event.to_le_bytes());
        b[10] = self.major_event;
        b[12..16].copy_from_slice(&self.shmseg.to_le_bytes());
        b[16..20].copy_from_slice(&self.offset.to_le_bytes());
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_layout() {
        let bytes = attach(130, 0x0440_0005, 98_312, false).unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[0..4], &[130, ATTACH, 4, 0]);
        assert_eq!(&bytes[4..8], &0x0440_0005u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &98_312u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_detach_and_query_version_layout() {
        assert_eq!(detach(130, 5).unwrap(), vec![130, DETACH, 2, 0, 5, 0, 0, 0]);
        assert_eq!(query_version(130).unwrap(), vec![130, QUERY_VERSION, 1, 0]);
    }

    #[test]
    fn test_put_image_is_forty_bytes() {
        // Arrange
        let p = ShmPutImage {
            drawable: 1,
            gc: 2,
            total_width: 800,
            total_height: 600,
            src_x: 0,
            src_y: 0,
            src_width: 800,
            src_height: 600,
            dst_x: 0,
            dst_y: 0,
            depth: 24,
            format: 2,
            send_event: true,
            shmseg: 3,
            offset: 0,
        };

        // Act
        let bytes = put_image(130, &p).unwrap();

        // Assert
        assert_eq!(bytes.len(), PUT_IMAGE_SIZE);
        assert_eq!(&bytes[0..4], &[130, PUT_IMAGE, 10, 0]);
        assert_eq!(bytes[28], 24);
        assert_eq!(bytes[29], 2);
        assert_eq!(bytes[30], 1);
        assert_eq!(&bytes[32..36], &3u32.to_le_bytes());
    }

    #[test]
    fn test_query_version_reply_round_trip() {
        let v = QueryVersionReply {
            shared_pixmaps: true,
            major_version: 1,
            minor_version: 2,
            uid: 1000,
            gid: 1000,
            pixmap_format: 2,
        };
        assert_eq!(QueryVersionReply::decode(&v.to_reply(4)).unwrap(), v);
    }

    #[test]
    fn test_completion_event_recognised_from_unknown() {
        // Arrange
        let done = CompletionEvent {
            sequence: 12,
            drawable: 0x0440_0001,
            minor_event: PUT_IMAGE as u16,
            major_event: 130,
            shmseg: 0x0440_0005,
            offset: 0,
        };
        let raw = done.encode(65);
        let event = Event::decode(&raw).unwrap();

        // Act / Assert
        assert_eq!(CompletionEvent::from_event(&event, 65), Some(done));
        assert_eq!(CompletionEvent::from_event(&event, 70), None);
    }
}
