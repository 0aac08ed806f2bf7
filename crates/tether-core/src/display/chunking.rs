//! Splitting one image upload into PutImage frames that fit the request cap.
//!
//! A frame carries `24 + rows * stride` bytes, so the number of whole rows per
//! frame is `floor((cap - 24) / stride)`.  Every chunk keeps the full width
//! and moves its destination down by the rows already sent:
//!
//! ```text
//! 800x600, 4 bytes/pixel, cap 262,140
//! stride = 3200, rows/chunk = 81
//! chunks: y=0..81, 81..162, ..., 567..600   (8 frames)
//! ```

use std::ops::Range;

use crate::display::codec::padded;
use crate::display::requests::{put_image, PutImageHeader, PUT_IMAGE_HEADER_SIZE};
use crate::error::EncodeError;

/// Shape of a packed pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLayout {
    pub width: u16,
    pub height: u16,
    /// Bytes per row, including scanline padding.
    pub stride: usize,
}

impl ImageLayout {
    /// Layout for `bytes_per_pixel`-wide pixels with rows padded to 4 bytes.
    pub fn packed(width: u16, height: u16, bytes_per_pixel: usize) -> Self {
        Self {
            width,
            height,
            stride: padded(width as usize * bytes_per_pixel),
        }
    }

    /// Total size of a buffer with this layout.
    pub fn byte_len(&self) -> usize {
        self.stride * self.height as usize
    }
}

/// One physical frame's share of the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageChunk {
    /// First source row in this chunk.
    pub first_row: u16,
    pub rows: u16,
    /// Byte range of the chunk within the source buffer.
    pub bytes: Range<usize>,
}

/// Plans the chunks for uploading an image with `layout` under a request cap
/// of `max_request_bytes`.
///
/// # Errors
///
/// Returns [`EncodeError::RequestTooLarge`] when a single row does not fit in
/// one request.
pub fn plan_put_image(
    layout: &ImageLayout,
    max_request_bytes: usize,
) -> Result<Vec<ImageChunk>, EncodeError> {
    let one_row = PUT_IMAGE_HEADER_SIZE + layout.stride;
    if layout.stride == 0 || one_row > max_request_bytes {
        return Err(EncodeError::RequestTooLarge {
            size: one_row,
            max: max_request_bytes,
        });
    }
    let per_chunk = ((max_request_bytes - PUT_IMAGE_HEADER_SIZE) / layout.stride)
        .min(u16::MAX as usize) as u16;

    let mut chunks = Vec::new();
    let mut row = 0u16;
    while row < layout.height {
        let rows = per_chunk.min(layout.height - row);
        let start = row as usize * layout.stride;
        chunks.push(ImageChunk {
            first_row: row,
            rows,
            bytes: start..start + rows as usize * layout.stride,
        });
        row += rows;
    }
    Ok(chunks)
}

/// Encodes every PutImage frame for `data`, placing the image's top-left
/// corner at `(header.dst_x, header.dst_y)`.
///
/// `header.width`/`height` are overwritten per chunk.
///
/// # Errors
///
/// Returns [`EncodeError::FieldOutOfRange`] when `data` is shorter than the
/// layout requires, and propagates [`plan_put_image`] errors.
pub fn encode_put_image(
    header: &PutImageHeader,
    layout: &ImageLayout,
    data: &[u8],
    max_request_bytes: usize,
) -> Result<Vec<Vec<u8>>, EncodeError> {
    if data.len() < layout.byte_len() {
        return Err(EncodeError::FieldOutOfRange {
            field: "image buffer length",
            value: data.len() as u64,
        });
    }
    plan_put_image(layout, max_request_bytes)?
        .into_iter()
        .map(|chunk| {
            let dst_y = header
                .dst_y
                .checked_add_unsigned(chunk.first_row)
                .ok_or(EncodeError::FieldOutOfRange {
                    field: "destination y",
                    value: chunk.first_row as u64,
                })?;
            let frame = PutImageHeader {
                width: layout.width,
                height: chunk.rows,
                dst_y,
                ..*header
            };
            put_image(&frame, &data[chunk.bytes])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::codec::MAX_REQUEST_BYTES;
    use crate::display::requests::IMAGE_FORMAT_Z_PIXMAP;

    fn header() -> PutImageHeader {
        PutImageHeader {
            format: IMAGE_FORMAT_Z_PIXMAP,
            drawable: 0x0440_0001,
            gc: 0x0440_0002,
            width: 0,
            height: 0,
            dst_x: 0,
            dst_y: 0,
            left_pad: 0,
            depth: 24,
        }
    }

    #[test]
    fn test_800_by_600_splits_into_eight_frames() {
        // Arrange
        let layout = ImageLayout::packed(800, 600, 4);

        // Act
        let chunks = plan_put_image(&layout, MAX_REQUEST_BYTES).unwrap();

        // Assert
        let r = (262_140 - 24) / 3200;
        assert_eq!(r, 81);
        assert_eq!(chunks.len(), 8);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.first_row as usize, i * r);
        }
        assert_eq!(chunks[7].rows, 600 - 7 * 81);
    }

    #[test]
    fn test_frames_reconstruct_the_buffer() {
        // Arrange
        let layout = ImageLayout::packed(800, 600, 4);
        let data: Vec<u8> = (0..layout.byte_len()).map(|i| (i * 7 % 251) as u8).collect();

        // Act
        let frames = encode_put_image(&header(), &layout, &data, MAX_REQUEST_BYTES).unwrap();

        // Assert
        let mut rebuilt = Vec::with_capacity(data.len());
        let mut expected_y = 0i16;
        for frame in &frames {
            assert!(frame.len() <= MAX_REQUEST_BYTES);
            let width = u16::from_le_bytes([frame[12], frame[13]]);
            let rows = u16::from_le_bytes([frame[14], frame[15]]);
            let dst_y = i16::from_le_bytes([frame[18], frame[19]]);
            assert_eq!(width, 800);
            assert_eq!(dst_y, expected_y);
            expected_y += rows as i16;
            rebuilt.extend_from_slice(&frame[PUT_IMAGE_HEADER_SIZE..]);
        }
        assert_eq!(frames.len(), 8);
        assert_eq!(rebuilt, data);
    }

    #[test]
    fn test_destination_offset_is_added_to_each_chunk() {
        let layout = ImageLayout::packed(800, 200, 4);
        let data = vec![0u8; layout.byte_len()];
        let base = PutImageHeader {
            dst_y: 100,
            ..header()
        };
        let frames = encode_put_image(&base, &layout, &data, MAX_REQUEST_BYTES).unwrap();
        let ys: Vec<i16> = frames
            .iter()
            .map(|f| i16::from_le_bytes([f[18], f[19]]))
            .collect();
        assert_eq!(ys, vec![100, 181, 262]);
    }

    #[test]
    fn test_small_image_is_one_frame() {
        let layout = ImageLayout::packed(3, 2, 4);
        let chunks = plan_put_image(&layout, MAX_REQUEST_BYTES).unwrap();
        assert_eq!(
            chunks,
            vec![ImageChunk {
                first_row: 0,
                rows: 2,
                bytes: 0..24,
            }]
        );
    }

    #[test]
    fn test_row_wider_than_cap_is_refused() {
        let layout = ImageLayout::packed(u16::MAX, 1, 8);
        assert!(matches!(
            plan_put_image(&layout, MAX_REQUEST_BYTES),
            Err(EncodeError::RequestTooLarge { .. })
        ));
    }

    #[test]
    fn test_short_buffer_is_refused() {
        let layout = ImageLayout::packed(10, 10, 4);
        assert!(encode_put_image(&header(), &layout, &[0u8; 10], MAX_REQUEST_BYTES).is_err());
    }
}
