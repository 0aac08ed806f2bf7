//! Asynchronous display events.
//!
//! Every event is exactly 32 bytes.  The codes this client acts on decode to
//! typed variants; every other code, including extension events whose codes
//! are only known after a capability probe, is kept verbatim in
//! [`Event::Unknown`] so nothing is silently discarded.
//!
//! Events forwarded by another client have bit 7 of the code set.  They
//! decode exactly like server-generated events.

use crate::display::codec::{WireReader, FRAME_SIZE, SENT_EVENT_BIT};
use crate::error::{require_len, DecodeError};

// ── Event codes ───────────────────────────────────────────────────────────────

pub const KEY_PRESS: u8 = 2;
pub const KEY_RELEASE: u8 = 3;
pub const BUTTON_PRESS: u8 = 4;
pub const BUTTON_RELEASE: u8 = 5;
pub const MOTION_NOTIFY: u8 = 6;
pub const FOCUS_IN: u8 = 9;
pub const FOCUS_OUT: u8 = 10;
pub const KEYMAP_NOTIFY: u8 = 11;
pub const EXPOSE: u8 = 12;
pub const DESTROY_NOTIFY: u8 = 17;
pub const UNMAP_NOTIFY: u8 = 18;
pub const MAP_NOTIFY: u8 = 19;
pub const CONFIGURE_NOTIFY: u8 = 22;
pub const CLIENT_MESSAGE: u8 = 33;

/// Event-mask bits used when creating windows.
pub mod mask {
    pub const KEY_PRESS: u32 = 1 << 0;
    pub const KEY_RELEASE: u32 = 1 << 1;
    pub const BUTTON_PRESS: u32 = 1 << 2;
    pub const BUTTON_RELEASE: u32 = 1 << 3;
    pub const POINTER_MOTION: u32 = 1 << 6;
    pub const EXPOSURE: u32 = 1 << 15;
    pub const STRUCTURE_NOTIFY: u32 = 1 << 17;
    pub const FOCUS_CHANGE: u32 = 1 << 21;
}

// ── Event payloads ────────────────────────────────────────────────────────────

/// Shared layout of key, button, and motion events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    /// Keycode for key events, button number for button events.
    pub detail: u8,
    pub sequence: u16,
    pub time: u32,
    pub root: u32,
    pub event: u32,
    pub child: u32,
    pub root_x: i16,
    pub root_y: i16,
    pub event_x: i16,
    pub event_y: i16,
    /// Modifier and button mask at the time of the event.
    pub state: u16,
    pub same_screen: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExposeEvent {
    pub sequence: u16,
    pub window: u32,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    /// Number of Expose events still to follow for this window.
    pub count: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusEvent {
    pub detail: u8,
    pub sequence: u16,
    pub event: u32,
    pub mode: u8,
}

/// Destroy, unmap, and map notifications share this shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowNotify {
    pub sequence: u16,
    pub event: u32,
    pub window: u32,
    /// `from_configure` for UnmapNotify, `override_redirect` for MapNotify,
    /// always `false` for DestroyNotify.
    pub flag: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigureEvent {
    pub sequence: u16,
    pub event: u32,
    pub window: u32,
    pub above_sibling: u32,
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
    pub border_width: u16,
    pub override_redirect: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientMessageEvent {
    /// 8, 16, or 32: how `data` should be interpreted.
    pub format: u8,
    pub sequence: u16,
    pub window: u32,
    pub message_type: u32,
    pub data: [u8; 20],
}

impl ClientMessageEvent {
    /// The payload read as five 32-bit values (format 32).
    pub fn data32(&self) -> [u32; 5] {
        let mut out = [0u32; 5];
        for (i, chunk) in self.data.chunks_exact(4).enumerate() {
            out[i] = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        out
    }
}

/// A decoded 32-byte event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    KeyPress(InputEvent),
    KeyRelease(InputEvent),
    ButtonPress(InputEvent),
    ButtonRelease(InputEvent),
    MotionNotify(InputEvent),
    FocusIn(FocusEvent),
    FocusOut(FocusEvent),
    Expose(ExposeEvent),
    DestroyNotify(WindowNotify),
    UnmapNotify(WindowNotify),
    MapNotify(WindowNotify),
    ConfigureNotify(ConfigureEvent),
    ClientMessage(ClientMessageEvent),
    /// Any other event, kept byte-for-byte (sent-event bit included).
    Unknown { code: u8, raw: Vec<u8> },
}

impl Event {
    /// The sequence number carried by the event.  KeymapNotify is the one
    /// core event without one.
    pub fn sequence(&self) -> Option<u16> {
        Some(match self {
            Event::KeyPress(e)
            | Event::KeyRelease(e)
            | Event::ButtonPress(e)
            | Event::ButtonRelease(e)
            | Event::MotionNotify(e) => e.sequence,
            Event::FocusIn(e) | Event::FocusOut(e) => e.sequence,
            Event::Expose(e) => e.sequence,
            Event::DestroyNotify(e) | Event::UnmapNotify(e) | Event::MapNotify(e) => e.sequence,
            Event::ConfigureNotify(e) => e.sequence,
            Event::ClientMessage(e) => e.sequence,
            Event::Unknown { code, raw } => {
                if code & !SENT_EVENT_BIT == KEYMAP_NOTIFY || raw.len() < 4 {
                    return None;
                }
                u16::from_le_bytes([raw[2], raw[3]])
            }
        })
    }

    /// Decodes one event.  `b` must hold at least 32 bytes; generic events
    /// may be longer and are returned as [`Event::Unknown`] whole.
    pub fn decode(b: &[u8]) -> Result<Self, DecodeError> {
        require_len(b, FRAME_SIZE)?;
        let code = b[0] & !SENT_EVENT_BIT;
        let event = match code {
            KEY_PRESS => Event::KeyPress(decode_input(b)?),
            KEY_RELEASE => Event::KeyRelease(decode_input(b)?),
            BUTTON_PRESS => Event::ButtonPress(decode_input(b)?),
            BUTTON_RELEASE => Event::ButtonRelease(decode_input(b)?),
            MOTION_NOTIFY => Event::MotionNotify(decode_input(b)?),
            FOCUS_IN => Event::FocusIn(decode_focus(b)?),
            FOCUS_OUT => Event::FocusOut(decode_focus(b)?),
            EXPOSE => {
                let mut r = WireReader::at(b, 2);
                let sequence = r.u16()?;
                Event::Expose(ExposeEvent {
                    sequence,
                    window: r.u32()?,
                    x: r.u16()?,
                    y: r.u16()?,
                    width: r.u16()?,
                    height: r.u16()?,
                    count: r.u16()?,
                })
            }
            DESTROY_NOTIFY => Event::DestroyNotify(decode_window_notify(b)?),
            UNMAP_NOTIFY => Event::UnmapNotify(decode_window_notify(b)?),
            MAP_NOTIFY => Event::MapNotify(decode_window_notify(b)?),
            CONFIGURE_NOTIFY => {
                let mut r = WireReader::at(b, 2);
                let sequence = r.u16()?;
                Event::ConfigureNotify(ConfigureEvent {
                    sequence,
                    event: r.u32()?,
                    window: r.u32()?,
                    above_sibling: r.u32()?,
                    x: r.i16()?,
                    y: r.i16()?,
                    width: r.u16()?,
                    height: r.u16()?,
                    border_width: r.u16()?,
                    override_redirect: r.u8()? != 0,
                })
            }
            CLIENT_MESSAGE => {
                let mut r = WireReader::at(b, 1);
                let format = r.u8()?;
                let sequence = r.u16()?;
                let window = r.u32()?;
                let message_type = r.u32()?;
                let mut data = [0u8; 20];
                data.copy_from_slice(r.bytes(20)?);
                Event::ClientMessage(ClientMessageEvent {
                    format,
                    sequence,
                    window,
                    message_type,
                    data,
                })
            }
            _ => Event::Unknown {
                code: b[0],
                raw: b.to_vec(),
            },
        };
        Ok(event)
    }

    /// Encodes the event as the server would send it.
    pub fn encode(&self) -> Vec<u8> {
        let mut b = vec![0u8; FRAME_SIZE];
        match self {
            Event::KeyPress(e) => encode_input(&mut b, KEY_PRESS, e),
            Event::KeyRelease(e) => encode_input(&mut b, KEY_RELEASE, e),
            Event::ButtonPress(e) => encode_input(&mut b, BUTTON_PRESS, e),
            Event::ButtonRelease(e) => encode_input(&mut b, BUTTON_RELEASE, e),
            Event::MotionNotify(e) => encode_input(&mut b, MOTION_NOTIFY, e),
            Event::FocusIn(e) => encode_focus(&mut b, FOCUS_IN, e),
            Event::FocusOut(e) => encode_focus(&mut b, FOCUS_OUT, e),
            Event::Expose(e) => {
                put_header(&mut b, EXPOSE, 0, e.sequence);
                put32(&mut b, 4, e.window);
                put16(&mut b, 8, e.x);
                put16(&mut b, 10, e.y);
                put16(&mut b, 12, e.width);
                put16(&mut b, 14, e.height);
                put16(&mut b, 16, e.count);
            }
            Event::DestroyNotify(e) => encode_window_notify(&mut b, DESTROY_NOTIFY, e),
            Event::UnmapNotify(e) => encode_window_notify(&mut b, UNMAP_NOTIFY, e),
            Event::MapNotify(e) => encode_window_notify(&mut b, MAP_NOTIFY, e),
            Event::ConfigureNotify(e) => {
                put_header(&mut b, CONFIGURE_NOTIFY, 0, e.sequence);
                put32(&mut b, 4, e.event);
                put32(&mut b, 8, e.window);
                put32(&mut b, 12, e.above_sibling);
                put16(&mut b, 16, e.x as u16);
                put16(&mut b, 18, e.y as u16);
                put16(&mut b, 20, e.width);
                put16(&mut b, 22, e.height);
                put16(&mut b, 24, e.border_width);
                b[26] = e.override_redirect as u8;
            }
            Event::ClientMessage(e) => {
                put_header(&mut b, CLIENT_MESSAGE, e.format, e.sequence);
                put32(&mut b, 4, e.window);
                put32(&mut b, 8, e.message_type);
                b[12..32].copy_from_slice(&e.data);
            }
            Event::Unknown { raw, .. } => return raw.clone(),
        }
        b
    }
}

// ── Layout helpers ────────────────────────────────────────────────────────────

fn decode_input(b: &[u8]) -> Result<InputEvent, DecodeError> {
    let mut r = WireReader::at(b, 1);
    Ok(InputEvent {
        detail: r.u8()?,
        sequence: r.u16()?,
        time: r.u32()?,
        root: r.u32()?,
        event: r.u32()?,
        child: r.u32()?,
        root_x: r.i16()?,
        root_y: r.i16()?,
        event_x: r.i16()?,
        event_y: r.i16()?,
        state: r.u16()?,
        same_screen: r.u8()? != 0,
    })
}

fn decode_focus(b: &[u8]) -> Result<FocusEvent, DecodeError> {
    let mut r = WireReader::at(b, 1);
    Ok(FocusEvent {
        detail: r.u8()?,
        sequence: r.u16()?,
        event: r.u32()?,
        mode: r.u8()?,
    })
}

fn decode_window_notify(b: &[u8]) -> Result<WindowNotify, DecodeError> {
    let mut r = WireReader::at(b, 2);
    Ok(WindowNotify {
        sequence: r.u16()?,
        event: r.u32()?,
        window: r.u32()?,
        flag: r.u8()? != 0,
    })
}

fn put_header(b: &mut [u8], code: u8, detail: u8, sequence: u16) {
    b[0] = code;
    b[1] = detail;
    put16(b, 2, sequence);
}

fn put16(b: &mut [u8], at: usize, v: u16) {
    b[at..at + 2].copy_from_slice(&v.to_le_bytes());
}

fn put32(b: &mut [u8], at: usize, v: u32) {
    b[at..at + 4].copy_from_slice(&v.to_le_bytes());
}

fn encode_input(b: &mut [u8], code: u8, e: &InputEvent) {
    put_header(b, code, e.detail, e.sequence);
    put32(b, 4, e.time);
    put32(b, 8, e.root);
    put32(b, 12, e.event);
    put32(b, 16, e.child);
    put16(b, 20, e.root_x as u16);
    put16(b, 22, e.root_y as u16);
    put16(b, 24, e.event_x as u16);
    put16(b, 26, e.event_y as u16);
    put16(b, 28, e.state);
    b[30] = e.same_screen as u8;
}

fn encode_focus(b: &mut [u8], code: u8, e: &FocusEvent) {
    put_header(b, code, e.detail, e.sequence);
    put32(b, 4, e.event);
    b[8] = e.mode;
}

fn encode_window_notify(b: &mut [u8], code: u8, e: &WindowNotify) {
    put_header(b, code, 0, e.sequence);
    put32(b, 4, e.event);
    put32(b, 8, e.window);
    b[12] = e.flag as u8;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(event: Event) {
        let bytes = event.encode();
        assert_eq!(bytes.len(), 32);
        assert_eq!(Event::decode(&bytes).unwrap(), event);
    }

    #[test]
    fn test_key_press_round_trip() {
        round_trip(Event::KeyPress(InputEvent {
            detail: 38,
            sequence: 17,
            time: 123_456,
            root: 0x0000_0532,
            event: 0x0040_0001,
            child: 0,
            root_x: -20,
            root_y: 300,
            event_x: 5,
            event_y: 6,
            state: 0x0001,
            same_screen: true,
        }));
    }

    #[test]
    fn test_expose_round_trip() {
        round_trip(Event::Expose(ExposeEvent {
            sequence: 3,
            window: 0x0040_0001,
            x: 0,
            y: 0,
            width: 800,
            height: 600,
            count: 0,
        }));
    }

    #[test]
    fn test_configure_notify_round_trip() {
        round_trip(Event::ConfigureNotify(ConfigureEvent {
            sequence: 9,
            event: 0x0040_0001,
            window: 0x0040_0001,
            above_sibling: 0,
            x: -4,
            y: 22,
            width: 1024,
            height: 768,
            border_width: 0,
            override_redirect: false,
        }));
    }

    #[test]
    fn test_client_message_round_trip_and_data32() {
        let mut data = [0u8; 20];
        data[0..4].copy_from_slice(&0x0000_0123u32.to_le_bytes());
        let event = ClientMessageEvent {
            format: 32,
            sequence: 1,
            window: 0x0040_0001,
            message_type: 0x0000_01A0,
            data,
        };
        assert_eq!(event.data32()[0], 0x123);
        round_trip(Event::ClientMessage(event));
    }

    #[test]
    fn test_unknown_event_is_kept_verbatim() {
        // Arrange – code 28 (PropertyNotify) is not decoded by this client
        let mut raw = vec![0u8; 32];
        raw[0] = 28;
        raw[2] = 0x05;
        raw[31] = 0xEE;

        // Act
        let event = Event::decode(&raw).unwrap();

        // Assert
        assert_eq!(event.sequence(), Some(5));
        assert_eq!(event.encode(), raw);
        assert!(matches!(event, Event::Unknown { code: 28, .. }));
    }

    #[test]
    fn test_keymap_notify_has_no_sequence() {
        let mut raw = vec![0u8; 32];
        raw[0] = KEYMAP_NOTIFY;
        raw[2] = 0x05;
        assert_eq!(Event::decode(&raw).unwrap().sequence(), None);
    }

    #[test]
    fn test_sent_event_decodes_like_real_event() {
        let real = Event::Expose(ExposeEvent {
            sequence: 1,
            window: 2,
            x: 0,
            y: 0,
            width: 1,
            height: 1,
            count: 0,
        });
        let mut bytes = real.encode();
        bytes[0] |= SENT_EVENT_BIT;
        assert_eq!(Event::decode(&bytes).unwrap(), real);
    }
}
