//! Encoders for the core request subset and decoders for their replies.
//!
//! Only the requests needed for a window's lifecycle and for pixel upload are
//! covered.  Each encoder returns the finished, padded frame; the caller
//! assigns it a sequence number simply by writing it.

use crate::display::codec::{ReplyFrame, RequestBuilder};
use crate::error::{DecodeError, EncodeError};

// ── Opcodes ───────────────────────────────────────────────────────────────────

pub const CREATE_WINDOW: u8 = 1;
pub const DESTROY_WINDOW: u8 = 4;
pub const MAP_WINDOW: u8 = 8;
pub const UNMAP_WINDOW: u8 = 10;
pub const INTERN_ATOM: u8 = 16;
pub const GET_INPUT_FOCUS: u8 = 43;
pub const CREATE_GC: u8 = 55;
pub const FREE_GC: u8 = 60;
pub const PUT_IMAGE: u8 = 72;
pub const QUERY_EXTENSION: u8 = 98;

/// Size of the PutImage request before its pixel data.
pub const PUT_IMAGE_HEADER_SIZE: usize = 24;

/// `format` value for packed pixels.
pub const IMAGE_FORMAT_Z_PIXMAP: u8 = 2;

/// Window class for an ordinary visible window.
pub const WINDOW_CLASS_INPUT_OUTPUT: u16 = 1;

/// Depth/visual value meaning "same as the parent".
pub const COPY_FROM_PARENT: u32 = 0;

// ── Value lists ───────────────────────────────────────────────────────────────

/// The CreateWindow attributes this client sets.  Values are written in mask
/// bit order, which is the order the server reads them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowAttributes {
    pub background_pixel: Option<u32>,
    pub border_pixel: Option<u32>,
    pub event_mask: Option<u32>,
}

impl WindowAttributes {
    const BACKGROUND_PIXEL: u32 = 1 << 1;
    const BORDER_PIXEL: u32 = 1 << 3;
    const EVENT_MASK: u32 = 1 << 11;

    fn append(&self, req: &mut RequestBuilder) {
        let mut mask = 0;
        let mut values = Vec::with_capacity(3);
        for (bit, value) in [
            (Self::BACKGROUND_PIXEL, self.background_pixel),
            (Self::BORDER_PIXEL, self.border_pixel),
            (Self::EVENT_MASK, self.event_mask),
        ] {
            if let Some(v) = value {
                mask |= bit;
                values.push(v);
            }
        }
        req.u32(mask);
        for v in values {
            req.u32(v);
        }
    }
}

/// The CreateGC values this client sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcValues {
    pub foreground: Option<u32>,
    pub background: Option<u32>,
    pub graphics_exposures: Option<bool>,
}

impl GcValues {
    const FOREGROUND: u32 = 1 << 2;
    const BACKGROUND: u32 = 1 << 3;
    const GRAPHICS_EXPOSURES: u32 = 1 << 16;

    fn append(&self, req: &mut RequestBuilder) {
        let mut mask = 0;
        let mut values = Vec::with_capacity(3);
        for (bit, value) in [
            (Self::FOREGROUND, self.foreground),
            (Self::BACKGROUND, self.background),
            (Self::GRAPHICS_EXPOSURES, self.graphics_exposures.map(u32::from)),
        ] {
            if let Some(v) = value {
                mask |= bit;
                values.push(v);
            }
        }
        req.u32(mask);
        for v in values {
            req.u32(v);
        }
    }
}

// ── Request encoders ──────────────────────────────────────────────────────────

/// Geometry and class of a new window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpec {
    pub depth: u8,
    pub window: u32,
    pub parent: u32,
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
    pub border_width: u16,
    pub class: u16,
    pub visual: u32,
}

pub fn create_window(spec: &WindowSpec, attrs: &WindowAttributes) -> Result<Vec<u8>, EncodeError> {
    let mut req = RequestBuilder::new(CREATE_WINDOW, spec.depth);
    req.u32(spec.window)
        .u32(spec.parent)
        .i16(spec.x)
        .i16(spec.y)
        .u16(spec.width)
        .u16(spec.height)
        .u16(spec.border_width)
        .u16(spec.class)
        .u32(spec.visual);
    attrs.append(&mut req);
    req.finish()
}

fn window_request(opcode: u8, window: u32) -> Result<Vec<u8>, EncodeError> {
    let mut req = RequestBuilder::new(opcode, 0);
    req.u32(window);
    req.finish()
}

pub fn destroy_window(window: u32) -> Result<Vec<u8>, EncodeError> {
    window_request(DESTROY_WINDOW, window)
}

pub fn map_window(window: u32) -> Result<Vec<u8>, EncodeError> {
    window_request(MAP_WINDOW, window)
}

pub fn unmap_window(window: u32) -> Result<Vec<u8>, EncodeError> {
    window_request(UNMAP_WINDOW, window)
}

pub fn create_gc(gc: u32, drawable: u32, values: &GcValues) -> Result<Vec<u8>, EncodeError> {
    let mut req = RequestBuilder::new(CREATE_GC, 0);
    req.u32(gc).u32(drawable);
    values.append(&mut req);
    req.finish()
}

pub fn free_gc(gc: u32) -> Result<Vec<u8>, EncodeError> {
    let mut req = RequestBuilder::new(FREE_GC, 0);
    req.u32(gc);
    req.finish()
}

fn named_request(opcode: u8, data: u8, name: &str) -> Result<Vec<u8>, EncodeError> {
    let len = u16::try_from(name.len()).map_err(|_| EncodeError::FieldOutOfRange {
        field: "name length",
        value: name.len() as u64,
    })?;
    let mut req = RequestBuilder::new(opcode, data);
    req.u16(len).unused(2).bytes_padded(name.as_bytes());
    req.finish()
}

/// Looks up (or with `only_if_exists == false`, creates) the atom for `name`.
pub fn intern_atom(only_if_exists: bool, name: &str) -> Result<Vec<u8>, EncodeError> {
    named_request(INTERN_ATOM, only_if_exists as u8, name)
}

pub fn query_extension(name: &str) -> Result<Vec<u8>, EncodeError> {
    named_request(QUERY_EXTENSION, 0, name)
}

/// A request with no arguments and a small reply.  Used as a round-trip
/// barrier after requests that have no reply of their own.
pub fn get_input_focus() -> Result<Vec<u8>, EncodeError> {
    RequestBuilder::new(GET_INPUT_FOCUS, 0).finish()
}

/// Placement of one PutImage frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutImageHeader {
    pub format: u8,
    pub drawable: u32,
    pub gc: u32,
    pub width: u16,
    pub height: u16,
    pub dst_x: i16,
    pub dst_y: i16,
    pub left_pad: u8,
    pub depth: u8,
}

/// Encodes one PutImage frame carrying `data` (already laid out row by row).
pub fn put_image(header: &PutImageHeader, data: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let mut req = RequestBuilder::new(PUT_IMAGE, header.format);
    req.u32(header.drawable)
        .u32(header.gc)
        .u16(header.width)
        .u16(header.height)
        .i16(header.dst_x)
        .i16(header.dst_y)
        .u8(header.left_pad)
        .u8(header.depth)
        .unused(2);
    debug_assert_eq!(req.len(), PUT_IMAGE_HEADER_SIZE);
    req.bytes_padded(data);
    req.finish()
}

// ── Reply decoders ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternAtomReply {
    /// Zero when `only_if_exists` was set and the atom does not exist.
    pub atom: u32,
}

impl InternAtomReply {
    pub fn decode(reply: &ReplyFrame) -> Result<Self, DecodeError> {
        Ok(Self {
            atom: reply.reader_at(8).u32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryExtensionReply {
    pub present: bool,
    pub major_opcode: u8,
    pub first_event: u8,
    pub first_error: u8,
}

impl QueryExtensionReply {
    pub fn decode(reply: &ReplyFrame) -> Result<Self, DecodeError> {
        let mut r = reply.reader_at(8);
        Ok(Self {
            present: r.u8()? != 0,
            major_opcode: r.u8()?,
            first_event: r.u8()?,
            first_error: r.u8()?,
        })
    }

    pub fn to_reply(&self, sequence: u16) -> ReplyFrame {
        ReplyFrame::from_parts(
            0,
            sequence,
            &[
                self.present as u8,
                self.major_opcode,
                self.first_event,
                self.first_error,
            ],
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetInputFocusReply {
    pub revert_to: u8,
    pub focus: u32,
}

impl GetInputFocusReply {
    pub fn decode(reply: &ReplyFrame) -> Result<Self, DecodeError> {
        Ok(Self {
            revert_to: reply.detail(),
            focus: reply.reader_at(8).u32()?,
        })
    }
}
