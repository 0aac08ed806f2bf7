//! Decode errors shared by both framings.
//!
//! A decode error fails the one operation that read the frame.  Frames are
//! length-delimited, so the transport stays usable and the next read starts
//! at the next frame boundary.

use thiserror::Error;

/// Errors that can occur while decoding a frame or a value inside one.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The byte slice is shorter than the field being read.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// A discriminant byte or code did not map to any known value.
    #[error("unknown {what}: {value:#x}")]
    UnknownDiscriminant { what: &'static str, value: u32 },

    /// A tagged value carried a different type tag than the field expects.
    #[error("expected {expected} tag, found {found:#04x}")]
    WrongTag { expected: &'static str, found: u8 },

    /// A tagged value was a valid null marker where a value is required.
    #[error("unexpected null where {expected} is required")]
    UnexpectedNull { expected: &'static str },

    /// A length field disagrees with the bytes that follow it.
    #[error("length mismatch: declared {declared}, available {available}")]
    LengthMismatch { declared: usize, available: usize },

    /// A reply answered a different request than the one being awaited.
    #[error("reply for {got} while awaiting {expected}")]
    UnexpectedReply { expected: String, got: String },

    /// Any other structural problem.
    #[error("malformed frame: {0}")]
    Malformed(String),
}

/// Fails with [`DecodeError::InsufficientData`] unless `buf` holds `needed` bytes.
pub(crate) fn require_len(buf: &[u8], needed: usize) -> Result<(), DecodeError> {
    if buf.len() < needed {
        Err(DecodeError::InsufficientData {
            needed,
            available: buf.len(),
        })
    } else {
        Ok(())
    }
}

/// Errors that can occur while encoding a request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// The request does not fit in the frame's length field.
    #[error("request too large: {size} bytes (max {max})")]
    RequestTooLarge { size: usize, max: usize },

    /// A field value cannot be represented in its wire width.
    #[error("field {field} out of range: {value}")]
    FieldOutOfRange { field: &'static str, value: u64 },
}
