//! Connection setup: the client preamble and the server's setup reply.
//!
//! # Preamble
//!
//! ```text
//! [byte_order:1 = 'l'][unused:1][major:2][minor:2]
//! [auth_name_len:2][auth_data_len:2][unused:2]
//! [auth_name][pad][auth_data][pad]
//! ```
//!
//! # Reply
//!
//! An 8-byte header whose first byte is the status and whose last two bytes
//! give the length of the rest of the reply in 4-byte units.  The success
//! body is a fixed 32-byte block followed by variable-length sections
//! (vendor string, pixmap formats, screens, and per screen its depths and
//! visuals).  The parser walks each section by its declared count and
//! length so that any trailing data a server appends is ignored rather than
//! misread.

use crate::display::codec::{padded, WireReader};
use crate::error::DecodeError;

/// Byte-order marker for a little-endian client.
pub const BYTE_ORDER_LSB_FIRST: u8 = b'l';

pub const PROTOCOL_MAJOR: u16 = 11;
pub const PROTOCOL_MINOR: u16 = 0;

/// Size of the status header every setup reply starts with.
pub const SETUP_HEADER_SIZE: usize = 8;

const STATUS_FAILED: u8 = 0;
const STATUS_SUCCESS: u8 = 1;
const STATUS_AUTHENTICATE: u8 = 2;

/// Fixed part of a successful setup body, before the vendor string.
const SUCCESS_FIXED_SIZE: usize = 32;
const FORMAT_SIZE: usize = 8;
const SCREEN_FIXED_SIZE: usize = 40;
const DEPTH_FIXED_SIZE: usize = 8;
const VISUAL_SIZE: usize = 24;

/// Encodes the connection preamble, optionally carrying one credential.
pub fn encode_preamble(auth_name: &[u8], auth_data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(12 + padded(auth_name.len()) + padded(auth_data.len()));
    buf.push(BYTE_ORDER_LSB_FIRST);
    buf.push(0);
    buf.extend_from_slice(&PROTOCOL_MAJOR.to_le_bytes());
    buf.extend_from_slice(&PROTOCOL_MINOR.to_le_bytes());
    buf.extend_from_slice(&(auth_name.len() as u16).to_le_bytes());
    buf.extend_from_slice(&(auth_data.len() as u16).to_le_bytes());
    buf.extend_from_slice(&[0, 0]);
    buf.extend_from_slice(auth_name);
    buf.resize(padded(buf.len()), 0);
    buf.extend_from_slice(auth_data);
    buf.resize(padded(buf.len()), 0);
    buf
}

/// Number of bytes that follow the 8-byte status header.
pub fn body_len(header: &[u8; SETUP_HEADER_SIZE]) -> usize {
    u16::from_le_bytes([header[6], header[7]]) as usize * 4
}

// ── Reply types ───────────────────────────────────────────────────────────────

/// How the server answered the preamble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    Success(SetupInfo),
    Failed(SetupFailure),
    /// The server wants further authentication, which this client does not
    /// implement.  Carries the server's reason text.
    Authenticate(String),
}

/// A refused connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupFailure {
    pub protocol_major: u16,
    pub protocol_minor: u16,
    pub reason: String,
}

impl SetupFailure {
    /// Encodes the full refusal (header and body) as a server would.
    pub fn encode(&self) -> Vec<u8> {
        let reason = self.reason.as_bytes();
        let body = padded(reason.len());
        let mut buf = Vec::with_capacity(SETUP_HEADER_SIZE + body);
        buf.push(STATUS_FAILED);
        buf.push(reason.len() as u8);
        buf.extend_from_slice(&self.protocol_major.to_le_bytes());
        buf.extend_from_slice(&self.protocol_minor.to_le_bytes());
        buf.extend_from_slice(&((body / 4) as u16).to_le_bytes());
        buf.extend_from_slice(reason);
        buf.resize(SETUP_HEADER_SIZE + body, 0);
        buf
    }
}

/// Pixel storage for one depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixmapFormat {
    pub depth: u8,
    pub bits_per_pixel: u8,
    pub scanline_pad: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visual {
    pub visual_id: u32,
    pub class: u8,
    pub bits_per_rgb_value: u8,
    pub colormap_entries: u16,
    pub red_mask: u32,
    pub green_mask: u32,
    pub blue_mask: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Depth {
    pub depth: u8,
    pub visuals: Vec<Visual>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub root: u32,
    pub default_colormap: u32,
    pub white_pixel: u32,
    pub black_pixel: u32,
    pub current_input_masks: u32,
    pub width_in_pixels: u16,
    pub height_in_pixels: u16,
    pub width_in_millimeters: u16,
    pub height_in_millimeters: u16,
    pub min_installed_maps: u16,
    pub max_installed_maps: u16,
    pub root_visual: u32,
    pub backing_stores: u8,
    pub save_unders: bool,
    pub root_depth: u8,
    pub allowed_depths: Vec<Depth>,
}

/// Session parameters negotiated by a successful setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupInfo {
    pub protocol_major: u16,
    pub protocol_minor: u16,
    pub release_number: u32,
    pub resource_id_base: u32,
    pub resource_id_mask: u32,
    pub motion_buffer_size: u32,
    pub vendor: String,
    /// Largest request the server accepts, in 4-byte units.
    pub maximum_request_length: u16,
    pub image_byte_order: u8,
    pub bitmap_format_bit_order: u8,
    pub bitmap_format_scanline_unit: u8,
    pub bitmap_format_scanline_pad: u8,
    pub min_keycode: u8,
    pub max_keycode: u8,
    pub pixmap_formats: Vec<PixmapFormat>,
    pub screens: Vec<Screen>,
}

impl SetupInfo {
    /// Largest request the server accepts, in bytes.
    pub fn max_request_bytes(&self) -> usize {
        self.maximum_request_length as usize * 4
    }

    /// The pixmap format used for images of `depth`.
    pub fn format_for_depth(&self, depth: u8) -> Option<&PixmapFormat> {
        self.pixmap_formats.iter().find(|f| f.depth == depth)
    }

    /// Encodes the full success reply (header and body) as a server would.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        let vendor = self.vendor.as_bytes();
        body.extend_from_slice(&self.release_number.to_le_bytes());
        body.extend_from_slice(&self.resource_id_base.to_le_bytes());
        body.extend_from_slice(&self.resource_id_mask.to_le_bytes());
        body.extend_from_slice(&self.motion_buffer_size.to_le_bytes());
        body.extend_from_slice(&(vendor.len() as u16).to_le_bytes());
        body.extend_from_slice(&self.maximum_request_length.to_le_bytes());
        body.push(self.screens.len() as u8);
        body.push(self.pixmap_formats.len() as u8);
        body.push(self.image_byte_order);
        body.push(self.bitmap_format_bit_order);
        body.push(self.bitmap_format_scanline_unit);
        body.push(self.bitmap_format_scanline_pad);
        body.push(self.min_keycode);
        body.push(self.max_keycode);
        body.extend_from_slice(&[0; 4]);
        body.extend_from_slice(vendor);
        body.resize(padded(body.len()), 0);
        for f in &self.pixmap_formats {
            body.extend_from_slice(&[f.depth, f.bits_per_pixel, f.scanline_pad, 0, 0, 0, 0, 0]);
        }
        for s in &self.screens {
            for v in [
                s.root,
                s.default_colormap,
                s.white_pixel,
                s.black_pixel,
                s.current_input_masks,
            ] {
                body.extend_from_slice(&v.to_le_bytes());
            }
            for v in [
                s.width_in_pixels,
                s.height_in_pixels,
                s.width_in_millimeters,
                s.height_in_millimeters,
                s.min_installed_maps,
                s.max_installed_maps,
            ] {
                body.extend_from_slice(&v.to_le_bytes());
            }
            body.extend_from_slice(&s.root_visual.to_le_bytes());
            body.push(s.backing_stores);
            body.push(s.save_unders as u8);
            body.push(s.root_depth);
            body.push(s.allowed_depths.len() as u8);
            for d in &s.allowed_depths {
                body.push(d.depth);
                body.push(0);
                body.extend_from_slice(&(d.visuals.len() as u16).to_le_bytes());
                body.extend_from_slice(&[0; 4]);
                for v in &d.visuals {
                    body.extend_from_slice(&v.visual_id.to_le_bytes());
                    body.push(v.class);
                    body.push(v.bits_per_rgb_value);
                    body.extend_from_slice(&v.colormap_entries.to_le_bytes());
                    body.extend_from_slice(&v.red_mask.to_le_bytes());
                    body.extend_from_slice(&v.green_mask.to_le_bytes());
                    body.extend_from_slice(&v.blue_mask.to_le_bytes());
                    body.extend_from_slice(&[0; 4]);
                }
            }
        }
        let mut buf = Vec::with_capacity(SETUP_HEADER_SIZE + body.len());
        buf.push(STATUS_SUCCESS);
        buf.push(0);
        buf.extend_from_slice(&self.protocol_major.to_le_bytes());
        buf.extend_from_slice(&self.protocol_minor.to_le_bytes());
        buf.extend_from_slice(&((body.len() / 4) as u16).to_le_bytes());
        buf.extend_from_slice(&body);
        buf
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parses the setup reply from its header and the body that followed it.
///
/// # Errors
///
/// Returns [`DecodeError::UnknownDiscriminant`] for an unknown status byte
/// and [`DecodeError::InsufficientData`] when a declared section runs past
/// the end of `body`.
pub fn parse_reply(
    header: &[u8; SETUP_HEADER_SIZE],
    body: &[u8],
) -> Result<SetupOutcome, DecodeError> {
    let major = u16::from_le_bytes([header[2], header[3]]);
    let minor = u16::from_le_bytes([header[4], header[5]]);
    match header[0] {
        STATUS_FAILED => {
            let len = header[1] as usize;
            let reason = WireReader::new(body).bytes(len)?;
            Ok(SetupOutcome::Failed(SetupFailure {
                protocol_major: major,
                protocol_minor: minor,
                reason: String::from_utf8_lossy(reason).into_owned(),
            }))
        }
        STATUS_AUTHENTICATE => {
            let reason = String::from_utf8_lossy(body)
                .trim_end_matches('\0')
                .to_string();
            Ok(SetupOutcome::Authenticate(reason))
        }
        STATUS_SUCCESS => parse_success(major, minor, body).map(SetupOutcome::Success),
        other => Err(DecodeError::UnknownDiscriminant {
            what: "setup status",
            value: other as u32,
        }),
    }
}

fn parse_success(major: u16, minor: u16, body: &[u8]) -> Result<SetupInfo, DecodeError> {
    let mut r = WireReader::new(body);
    let release_number = r.u32()?;
    let resource_id_base = r.u32()?;
    let resource_id_mask = r.u32()?;
    let motion_buffer_size = r.u32()?;
    let vendor_len = r.u16()? as usize;
    let maximum_request_length = r.u16()?;
    let screen_count = r.u8()? as usize;
    let format_count = r.u8()? as usize;
    let image_byte_order = r.u8()?;
    let bitmap_format_bit_order = r.u8()?;
    let bitmap_format_scanline_unit = r.u8()?;
    let bitmap_format_scanline_pad = r.u8()?;
    let min_keycode = r.u8()?;
    let max_keycode = r.u8()?;
    r.skip(4)?;
    debug_assert_eq!(r.position(), SUCCESS_FIXED_SIZE);

    let vendor = String::from_utf8_lossy(r.bytes(vendor_len)?).into_owned();
    r.skip_pad(vendor_len)?;

    let mut pixmap_formats = Vec::with_capacity(format_count);
    for _ in 0..format_count {
        let f = r.bytes(FORMAT_SIZE)?;
        pixmap_formats.push(PixmapFormat {
            depth: f[0],
            bits_per_pixel: f[1],
            scanline_pad: f[2],
        });
    }

    let mut screens = Vec::with_capacity(screen_count);
    for _ in 0..screen_count {
        screens.push(parse_screen(&mut r)?);
    }

    Ok(SetupInfo {
        protocol_major: major,
        protocol_minor: minor,
        release_number,
        resource_id_base,
        resource_id_mask,
        motion_buffer_size,
        vendor,
        maximum_request_length,
        image_byte_order,
        bitmap_format_bit_order,
        bitmap_format_scanline_unit,
        bitmap_format_scanline_pad,
        min_keycode,
        max_keycode,
        pixmap_formats,
        screens,
    })
}

fn parse_screen(r: &mut WireReader<'_>) -> Result<Screen, DecodeError> {
    let start = r.position();
    let root = r.u32()?;
    let default_colormap = r.u32()?;
    let white_pixel = r.u32()?;
    let black_pixel = r.u32()?;
    let current_input_masks = r.u32()?;
    let width_in_pixels = r.u16()?;
    let height_in_pixels = r.u16()?;
    let width_in_millimeters = r.u16()?;
    let height_in_millimeters = r.u16()?;
    let min_installed_maps = r.u16()?;
    let max_installed_maps = r.u16()?;
    let root_visual = r.u32()?;
    let backing_stores = r.u8()?;
    let save_unders = r.u8()? != 0;
    let root_depth = r.u8()?;
    let depth_count = r.u8()? as usize;
    debug_assert_eq!(r.position() - start, SCREEN_FIXED_SIZE);

    let mut allowed_depths = Vec::with_capacity(depth_count);
    for _ in 0..depth_count {
        let depth = r.u8()?;
        r.skip(1)?;
        let visual_count = r.u16()? as usize;
        r.skip(DEPTH_FIXED_SIZE - 4)?;
        let mut visuals = Vec::with_capacity(visual_count);
        for _ in 0..visual_count {
            let v = r.bytes(VISUAL_SIZE)?;
            let mut vr = WireReader::new(v);
            visuals.push(Visual {
                visual_id: vr.u32()?,
                class: vr.u8()?,
                bits_per_rgb_value: vr.u8()?,
                colormap_entries: vr.u16()?,
                red_mask: vr.u32()?,
                green_mask: vr.u32()?,
                blue_mask: vr.u32()?,
            });
        }
        allowed_depths.push(Depth { depth, visuals });
    }

    Ok(Screen {
        root,
        default_colormap,
        white_pixel,
        black_pixel,
        current_input_masks,
        width_in_pixels,
        height_in_pixels,
        width_in_millimeters,
        height_in_millimeters,
        min_installed_maps,
        max_installed_maps,
        root_visual,
        backing_stores,
        save_unders,
        root_depth,
        allowed_depths,
    })
}

/// A small but complete setup, shared by tests across the workspace.
#[doc(hidden)]
pub fn sample_setup() -> SetupInfo {
    SetupInfo {
        protocol_major: PROTOCOL_MAJOR,
        protocol_minor: PROTOCOL_MINOR,
        release_number: 12_101_004,
        resource_id_base: 0x0440_0000,
        resource_id_mask: 0x001F_FFFF,
        motion_buffer_size: 256,
        vendor: "The X.Org Foundation".to_string(),
        maximum_request_length: u16::MAX,
        image_byte_order: 0,
        bitmap_format_bit_order: 0,
        bitmap_format_scanline_unit: 32,
        bitmap_format_scanline_pad: 32,
        min_keycode: 8,
        max_keycode: 255,
        pixmap_formats: vec![
            PixmapFormat {
                depth: 1,
                bits_per_pixel: 1,
                scanline_pad: 32,
            },
            PixmapFormat {
                depth: 24,
                bits_per_pixel: 32,
                scanline_pad: 32,
            },
        ],
        screens: vec![Screen {
            root: 0x0000_0532,
            default_colormap: 0x0000_0021,
            white_pixel: 0x00FF_FFFF,
            black_pixel: 0,
            current_input_masks: 0,
            width_in_pixels: 1920,
            height_in_pixels: 1080,
            width_in_millimeters: 508,
            height_in_millimeters: 285,
            min_installed_maps: 1,
            max_installed_maps: 1,
            root_visual: 0x0000_0021,
            backing_stores: 0,
            save_unders: false,
            root_depth: 24,
            allowed_depths: vec![Depth {
                depth: 24,
                visuals: vec![Visual {
                    visual_id: 0x0000_0021,
                    class: 4,
                    bits_per_rgb_value: 8,
                    colormap_entries: 256,
                    red_mask: 0x00FF_0000,
                    green_mask: 0x0000_FF00,
                    blue_mask: 0x0000_00FF,
                }],
            }],
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(reply: &[u8]) -> ([u8; 8], &[u8]) {
        let mut header = [0u8; 8];
        header.copy_from_slice(&reply[..8]);
        (header, &reply[8..])
    }

    #[test]
    fn test_preamble_without_credential() {
        assert_eq!(
            encode_preamble(b"", b""),
            vec![b'l', 0, 11, 0, 0, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_preamble_pads_name_and_data() {
        // Arrange
        let name = b"MIT-MAGIC-COOKIE-1"; // 18 bytes -> 20
        let data = [0xAAu8; 16];

        // Act
        let bytes = encode_preamble(name, &data);

        // Assert
        assert_eq!(bytes.len(), 12 + 20 + 16);
        assert_eq!(&bytes[6..8], &18u16.to_le_bytes());
        assert_eq!(&bytes[8..10], &16u16.to_le_bytes());
        assert_eq!(&bytes[12..30], name);
        assert_eq!(&bytes[30..32], &[0, 0]);
        assert_eq!(&bytes[32..48], &data);
    }

    #[test]
    fn test_success_reply_round_trip() {
        // Arrange
        let info = sample_setup();
        let reply = info.encode();
        let (header, body) = split(&reply);

        // Act
        let parsed = parse_reply(&header, body).unwrap();

        // Assert
        assert_eq!(body_len(&header), body.len());
        assert_eq!(parsed, SetupOutcome::Success(info.clone()));
        assert_eq!(info.max_request_bytes(), 262_140);
        assert_eq!(info.format_for_depth(24).unwrap().bits_per_pixel, 32);
    }

    #[test]
    fn test_trailing_server_data_is_ignored() {
        // Arrange – append a word of optional trailing data
        let info = sample_setup();
        let mut reply = info.encode();
        reply.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        let words = (reply.len() - 8) / 4;
        reply[6..8].copy_from_slice(&(words as u16).to_le_bytes());
        let (header, body) = split(&reply);

        // Act / Assert
        assert_eq!(
            parse_reply(&header, body).unwrap(),
            SetupOutcome::Success(info)
        );
    }

    #[test]
    fn test_failed_reply_carries_reason() {
        let failure = SetupFailure {
            protocol_major: 11,
            protocol_minor: 0,
            reason: "No protocol specified\n".to_string(),
        };
        let reply = failure.encode();
        let (header, body) = split(&reply);
        assert_eq!(
            parse_reply(&header, body).unwrap(),
            SetupOutcome::Failed(failure)
        );
    }

    #[test]
    fn test_truncated_screen_section_is_rejected() {
        let reply = sample_setup().encode();
        let (header, body) = split(&reply);
        let cut = &body[..body.len() - 10];
        assert!(matches!(
            parse_reply(&header, cut),
            Err(DecodeError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let header = [7u8, 0, 11, 0, 0, 0, 0, 0];
        assert!(matches!(
            parse_reply(&header, &[]),
            Err(DecodeError::UnknownDiscriminant { value: 7, .. })
        ));
    }
}
