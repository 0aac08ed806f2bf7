//! Credential formats for both protocols.
//!
//! # Display credentials
//!
//! The authority file is a flat sequence of records, each big-endian:
//!
//! ```text
//! [family:2]
//! [address_len:2][address]
//! [number_len:2][number]      display number as ASCII, e.g. "0"
//! [name_len:2][name]          mechanism, e.g. "MIT-MAGIC-COOKIE-1"
//! [data_len:2][data]          the secret
//! ```
//!
//! A record applies to a display when its number equals the display number
//! and its family is local to this machine (`Local` with the host name as
//! address) or a wildcard.  Not finding a record is not an error: the client
//! connects without a credential and lets the server decide.
//!
//! # Audio credentials
//!
//! A 256-byte block read verbatim from a file.  When no file exists the
//! client sends 256 zero bytes, which servers configured for anonymous local
//! access accept.

use std::fmt;

use thiserror::Error;
use tracing::trace;

/// The one display authentication mechanism this client speaks.
pub const MIT_MAGIC_COOKIE: &str = "MIT-MAGIC-COOKIE-1";

/// Record family for a connection from this machine; the address is the
/// host name.
pub const FAMILY_LOCAL: u16 = 256;

/// Record family matching any address.
pub const FAMILY_WILD: u16 = 65535;

/// Size of an audio cookie.
pub const COOKIE_LEN: usize = 256;

/// Errors that can occur while parsing credential data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// A record ended before one of its declared fields.
    #[error("authority record truncated at byte {offset}: need {needed} more bytes")]
    Truncated { offset: usize, needed: usize },

    /// A cookie file was shorter than a cookie.
    #[error("cookie is {len} bytes, expected {COOKIE_LEN}")]
    CookieLength { len: usize },
}

// ── Authority records ─────────────────────────────────────────────────────────

/// One record of an authority file.
#[derive(Clone, PartialEq, Eq)]
pub struct XauthEntry {
    pub family: u16,
    pub address: Vec<u8>,
    /// Display number as written in the file.
    pub number: String,
    /// Mechanism name.
    pub name: String,
    pub data: Vec<u8>,
}

impl fmt::Debug for XauthEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XauthEntry")
            .field("family", &self.family)
            .field("address", &String::from_utf8_lossy(&self.address))
            .field("number", &self.number)
            .field("name", &self.name)
            .field("data", &format_args!("<{} bytes>", self.data.len()))
            .finish()
    }
}

struct RecordReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> RecordReader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], AuthError> {
        let available = self.buf.len() - self.pos;
        if available < n {
            return Err(AuthError::Truncated {
                offset: self.pos,
                needed: n - available,
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16, AuthError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn counted(&mut self) -> Result<&'a [u8], AuthError> {
        let len = self.u16()? as usize;
        self.take(len)
    }
}

fn put_counted(buf: &mut Vec<u8>, data: &[u8]) {
    buf.extend_from_slice(&(data.len() as u16).to_be_bytes());
    buf.extend_from_slice(data);
}

impl XauthEntry {
    /// Parses every record in an authority file.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Truncated`] if the data ends inside a record.
    pub fn parse_all(bytes: &[u8]) -> Result<Vec<Self>, AuthError> {
        let mut r = RecordReader { buf: bytes, pos: 0 };
        let mut entries = Vec::new();
        while r.pos < bytes.len() {
            let family = r.u16()?;
            let address = r.counted()?.to_vec();
            let number = String::from_utf8_lossy(r.counted()?).into_owned();
            let name = String::from_utf8_lossy(r.counted()?).into_owned();
            let data = r.counted()?.to_vec();
            entries.push(Self {
                family,
                address,
                number,
                name,
                data,
            });
        }
        Ok(entries)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(10 + self.address.len() + self.data.len() + 32);
        buf.extend_from_slice(&self.family.to_be_bytes());
        put_counted(&mut buf, &self.address);
        put_counted(&mut buf, self.number.as_bytes());
        put_counted(&mut buf, self.name.as_bytes());
        put_counted(&mut buf, &self.data);
        buf
    }

    fn is_local_to(&self, hostname: &str) -> bool {
        self.family == FAMILY_LOCAL && self.address == hostname.as_bytes()
    }
}

/// Picks the credential for `display` on `hostname`.
///
/// Only records for the exact display number and the supported mechanism are
/// considered.  Among those, a `Local` record naming this host wins over any
/// other `Local` record, which wins over a wildcard; ties go to the earlier
/// record in the file.
pub fn find_entry<'a>(
    entries: &'a [XauthEntry],
    display: &str,
    hostname: &str,
) -> Option<&'a XauthEntry> {
    let candidates = || {
        entries
            .iter()
            .filter(move |e| e.number == display && e.name == MIT_MAGIC_COOKIE)
    };
    let found = candidates()
        .find(|e| e.is_local_to(hostname))
        .or_else(|| candidates().find(|e| e.family == FAMILY_LOCAL))
        .or_else(|| candidates().find(|e| e.family == FAMILY_WILD));
    let display_number = display;
    match found {
        Some(e) => trace!(display = display_number, family = e.family, "authority record matched"),
        None => trace!(display = display_number, records = entries.len(), "no authority record matched"),
    }
    found
}

// ── Audio cookie ──────────────────────────────────────────────────────────────

/// The 256-byte audio credential.
#[derive(Clone, PartialEq, Eq)]
pub struct Cookie([u8; COOKIE_LEN]);

impl Cookie {
    /// The all-zero cookie used when no cookie file exists.
    pub fn anonymous() -> Self {
        Cookie([0; COOKIE_LEN])
    }

    /// Takes the first 256 bytes of a cookie file.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CookieLength`] if `bytes` is shorter than a cookie.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AuthError> {
        let block = bytes
            .get(..COOKIE_LEN)
            .ok_or(AuthError::CookieLength { len: bytes.len() })?;
        let mut c = [0u8; COOKIE_LEN];
        c.copy_from_slice(block);
        Ok(Cookie(c))
    }

    pub fn as_bytes(&self) -> &[u8; COOKIE_LEN] {
        &self.0
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_anonymous() {
            f.write_str("Cookie(anonymous)")
        } else {
            f.write_str("Cookie(<redacted>)")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(family: u16, address: &str, number: &str, secret: u8) -> XauthEntry {
        XauthEntry {
            family,
            address: address.as_bytes().to_vec(),
            number: number.to_string(),
            name: MIT_MAGIC_COOKIE.to_string(),
            data: vec![secret; 16],
        }
    }

    fn file(entries: &[XauthEntry]) -> Vec<u8> {
        entries.iter().flat_map(|e| e.encode()).collect()
    }

    #[test]
    fn test_record_layout_is_big_endian() {
        let bytes = entry(FAMILY_LOCAL, "box", "0", 1).encode();
        assert_eq!(&bytes[..2], &[0x01, 0x00]);
        assert_eq!(&bytes[2..4], &[0, 3]);
        assert_eq!(&bytes[4..7], b"box");
        assert_eq!(&bytes[7..10], &[0, 1, b'0']);
    }

    #[test]
    fn test_display_seven_resolves_to_seven_in_any_order() {
        // Arrange
        let zero = entry(FAMILY_LOCAL, "box", "0", 0x00);
        let seven = entry(FAMILY_LOCAL, "box", "7", 0x77);

        for order in [vec![zero.clone(), seven.clone()], vec![seven.clone(), zero.clone()]] {
            // Act
            let parsed = XauthEntry::parse_all(&file(&order)).unwrap();
            let found = find_entry(&parsed, "7", "box");

            // Assert
            assert_eq!(found, Some(&seven));
        }
    }

    #[test]
    fn test_local_host_beats_other_local_beats_wild() {
        // Arrange
        let wild = entry(FAMILY_WILD, "", "0", 1);
        let other = entry(FAMILY_LOCAL, "elsewhere", "0", 2);
        let mine = entry(FAMILY_LOCAL, "box", "0", 3);

        // Act / Assert
        let all = vec![wild.clone(), other.clone(), mine.clone()];
        assert_eq!(find_entry(&all, "0", "box"), Some(&mine));
        let no_mine = vec![wild.clone(), other.clone()];
        assert_eq!(find_entry(&no_mine, "0", "box"), Some(&other));
        let only_wild = vec![wild.clone()];
        assert_eq!(find_entry(&only_wild, "0", "box"), Some(&wild));
    }

    #[test]
    fn test_no_match_is_none() {
        let mut other_mech = entry(FAMILY_LOCAL, "box", "0", 1);
        other_mech.name = "XDM-AUTHORIZATION-1".to_string();
        let entries = vec![other_mech, entry(0, "10.0.0.1", "0", 2)];
        assert_eq!(find_entry(&entries, "0", "box"), None);
        assert_eq!(find_entry(&[], "0", "box"), None);
    }

    #[test]
    fn test_truncated_file_is_rejected() {
        let bytes = file(&[entry(FAMILY_LOCAL, "box", "0", 1)]);
        assert!(matches!(
            XauthEntry::parse_all(&bytes[..bytes.len() - 3]),
            Err(AuthError::Truncated { .. })
        ));
    }

    #[test]
    fn test_cookie_from_file_bytes() {
        assert!(Cookie::anonymous().is_anonymous());
        let c = Cookie::from_bytes(&[7u8; 300]).unwrap();
        assert_eq!(c.as_bytes(), &[7u8; COOKIE_LEN]);
        assert_eq!(
            Cookie::from_bytes(&[1u8; 10]),
            Err(AuthError::CookieLength { len: 10 })
        );
        assert_eq!(format!("{c:?}"), "Cookie(<redacted>)");
    }
}
