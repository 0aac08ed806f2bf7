//! Self-describing tagged values.
//!
//! Every value is `[tag:1][payload]`, big-endian.  The reader checks each tag
//! against the type the caller asked for, so a schema mismatch surfaces as
//! [`DecodeError::WrongTag`] instead of a misread.  The null string is its own
//! tag (`'N'`), which is why "absent" and "wrong type" are distinct errors.
//!
//! | tag   | value                 | payload                              |
//! |-------|-----------------------|--------------------------------------|
//! | `t`   | string                | bytes, NUL-terminated                |
//! | `N`   | null string           | none                                 |
//! | `L`   | u32                   | 4 bytes                              |
//! | `B`   | u8                    | 1 byte                               |
//! | `R`   | u64                   | 8 bytes                              |
//! | `r`   | s64                   | 8 bytes                              |
//! | `a`   | sample spec           | format:1, channels:1, rate:4         |
//! | `x`   | arbitrary             | length:4, bytes                      |
//! | `1/0` | boolean               | none                                 |
//! | `T`   | timeval               | seconds:4, microseconds:4            |
//! | `U`   | microseconds          | 8 bytes                              |
//! | `m`   | channel map           | count:1, positions                   |
//! | `v`   | per-channel volume    | count:1, volumes:4 each              |
//! | `V`   | volume                | 4 bytes                              |
//! | `P`   | property list         | (string, `L` length, `x` value)*, `N`|
//! | `f`   | format info           | `B` encoding, `P` properties         |

use crate::error::DecodeError;

// ── Tags ──────────────────────────────────────────────────────────────────────

pub const TAG_STRING: u8 = b't';
pub const TAG_STRING_NULL: u8 = b'N';
pub const TAG_U32: u8 = b'L';
pub const TAG_U8: u8 = b'B';
pub const TAG_U64: u8 = b'R';
pub const TAG_S64: u8 = b'r';
pub const TAG_SAMPLE_SPEC: u8 = b'a';
pub const TAG_ARBITRARY: u8 = b'x';
pub const TAG_BOOLEAN_TRUE: u8 = b'1';
pub const TAG_BOOLEAN_FALSE: u8 = b'0';
pub const TAG_TIMEVAL: u8 = b'T';
pub const TAG_USEC: u8 = b'U';
pub const TAG_CHANNEL_MAP: u8 = b'm';
pub const TAG_CVOLUME: u8 = b'v';
pub const TAG_PROPLIST: u8 = b'P';
pub const TAG_VOLUME: u8 = b'V';
pub const TAG_FORMAT_INFO: u8 = b'f';

/// Largest channel count a sample spec, channel map or volume may carry.
pub const CHANNELS_MAX: u8 = 32;

/// Full volume, no attenuation.
pub const VOLUME_NORM: u32 = 0x0001_0000;

// ── Compound values ───────────────────────────────────────────────────────────

/// Sample encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SampleFormat {
    U8 = 0,
    Alaw = 1,
    Ulaw = 2,
    S16Le = 3,
    S16Be = 4,
    Float32Le = 5,
    Float32Be = 6,
    S32Le = 7,
    S32Be = 8,
    S24Le = 9,
    S24Be = 10,
    S24In32Le = 11,
    S24In32Be = 12,
}

impl SampleFormat {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::U8 | SampleFormat::Alaw | SampleFormat::Ulaw => 1,
            SampleFormat::S16Le | SampleFormat::S16Be => 2,
            SampleFormat::S24Le | SampleFormat::S24Be => 3,
            _ => 4,
        }
    }
}

impl TryFrom<u8> for SampleFormat {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => SampleFormat::U8,
            1 => SampleFormat::Alaw,
            2 => SampleFormat::Ulaw,
            3 => SampleFormat::S16Le,
            4 => SampleFormat::S16Be,
            5 => SampleFormat::Float32Le,
            6 => SampleFormat::Float32Be,
            7 => SampleFormat::S32Le,
            8 => SampleFormat::S32Be,
            9 => SampleFormat::S24Le,
            10 => SampleFormat::S24Be,
            11 => SampleFormat::S24In32Le,
            12 => SampleFormat::S24In32Be,
            other => {
                return Err(DecodeError::UnknownDiscriminant {
                    what: "sample format",
                    value: other as u32,
                })
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleSpec {
    pub format: SampleFormat,
    pub channels: u8,
    pub rate: u32,
}

impl SampleSpec {
    /// Bytes in one frame (one sample for every channel).
    pub fn frame_size(&self) -> usize {
        self.format.bytes_per_sample() * self.channels as usize
    }

    /// Bytes per second of audio.
    pub fn bytes_per_second(&self) -> usize {
        self.frame_size() * self.rate as usize
    }
}

/// Speaker position of each channel, in channel order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelMap(pub Vec<u8>);

impl ChannelMap {
    pub const MONO: u8 = 0;
    pub const FRONT_LEFT: u8 = 1;
    pub const FRONT_RIGHT: u8 = 2;

    /// The conventional map for one or two channels, or an auxiliary map
    /// (positions starting at `AUX0`) for anything wider.
    pub fn default_for(channels: u8) -> Self {
        match channels {
            1 => ChannelMap(vec![Self::MONO]),
            2 => ChannelMap(vec![Self::FRONT_LEFT, Self::FRONT_RIGHT]),
            n => ChannelMap((0..n).map(|i| 12 + i).collect()),
        }
    }
}

/// Per-channel volume.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CVolume(pub Vec<u32>);

impl CVolume {
    pub fn uniform(channels: u8, volume: u32) -> Self {
        CVolume(vec![volume; channels as usize])
    }
}

/// Ordered key/value properties.  String values carry their trailing NUL on
/// the wire, the way the server stores them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Proplist(Vec<(String, Vec<u8>)>);

impl Proplist {
    pub const APPLICATION_NAME: &'static str = "application.name";
    pub const MEDIA_NAME: &'static str = "media.name";

    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to raw bytes, replacing any earlier value.
    pub fn set(&mut self, key: &str, value: Vec<u8>) {
        match self.0.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key.to_string(), value)),
        }
    }

    pub fn set_str(&mut self, key: &str, value: &str) {
        let mut bytes = Vec::with_capacity(value.len() + 1);
        bytes.extend_from_slice(value.as_bytes());
        bytes.push(0);
        self.set(key, bytes);
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        let bytes = self.get(key)?;
        let bytes = bytes.strip_suffix(&[0]).unwrap_or(bytes);
        std::str::from_utf8(bytes).ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// A stream format: an encoding plus properties describing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatInfo {
    pub encoding: u8,
    pub properties: Proplist,
}

impl FormatInfo {
    /// Plain PCM.
    pub const ENCODING_PCM: u8 = 1;

    pub fn pcm() -> Self {
        Self {
            encoding: Self::ENCODING_PCM,
            properties: Proplist::new(),
        }
    }
}

/// Any single tagged value, for code that walks a structure without knowing
/// its schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    String(String),
    Null,
    U32(u32),
    U8(u8),
    U64(u64),
    S64(i64),
    SampleSpec(SampleSpec),
    Arbitrary(Vec<u8>),
    Boolean(bool),
    Timeval { seconds: u32, microseconds: u32 },
    Usec(u64),
    ChannelMap(ChannelMap),
    CVolume(CVolume),
    Proplist(Proplist),
    Volume(u32),
    FormatInfo(FormatInfo),
}

// ── Writer ────────────────────────────────────────────────────────────────────

/// Appends tagged values to a buffer.
#[derive(Debug, Clone, Default)]
pub struct TagStructWriter {
    buf: Vec<u8>,
}

impl TagStructWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn put_u8(&mut self, v: u8) -> &mut Self {
        self.buf.extend_from_slice(&[TAG_U8, v]);
        self
    }

    pub fn put_u32(&mut self, v: u32) -> &mut Self {
        self.buf.push(TAG_U32);
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn put_u64(&mut self, v: u64) -> &mut Self {
        self.buf.push(TAG_U64);
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn put_s64(&mut self, v: i64) -> &mut Self {
        self.buf.push(TAG_S64);
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn put_bool(&mut self, v: bool) -> &mut Self {
        self.buf
            .push(if v { TAG_BOOLEAN_TRUE } else { TAG_BOOLEAN_FALSE });
        self
    }

    /// Writes a string, or the null marker for `None`.  Strings are cut at
    /// the first interior NUL, since the wire form is NUL-terminated.
    pub fn put_string(&mut self, v: Option<&str>) -> &mut Self {
        match v {
            Some(s) => {
                let bytes = s.as_bytes();
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                self.buf.push(TAG_STRING);
                self.buf.extend_from_slice(&bytes[..end]);
                self.buf.push(0);
            }
            None => self.buf.push(TAG_STRING_NULL),
        }
        self
    }

    pub fn put_arbitrary(&mut self, data: &[u8]) -> &mut Self {
        self.buf.push(TAG_ARBITRARY);
        self.buf.extend_from_slice(&(data.len() as u32).to_be_bytes());
        self.buf.extend_from_slice(data);
        self
    }

    pub fn put_sample_spec(&mut self, spec: &SampleSpec) -> &mut Self {
        self.buf
            .extend_from_slice(&[TAG_SAMPLE_SPEC, spec.format as u8, spec.channels]);
        self.buf.extend_from_slice(&spec.rate.to_be_bytes());
        self
    }

    pub fn put_timeval(&mut self, seconds: u32, microseconds: u32) -> &mut Self {
        self.buf.push(TAG_TIMEVAL);
        self.buf.extend_from_slice(&seconds.to_be_bytes());
        self.buf.extend_from_slice(&microseconds.to_be_bytes());
        self
    }

    pub fn put_usec(&mut self, v: u64) -> &mut Self {
        self.buf.push(TAG_USEC);
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn put_channel_map(&mut self, map: &ChannelMap) -> &mut Self {
        self.buf.extend_from_slice(&[TAG_CHANNEL_MAP, map.0.len() as u8]);
        self.buf.extend_from_slice(&map.0);
        self
    }

    pub fn put_cvolume(&mut self, volume: &CVolume) -> &mut Self {
        self.buf.extend_from_slice(&[TAG_CVOLUME, volume.0.len() as u8]);
        for v in &volume.0 {
            self.buf.extend_from_slice(&v.to_be_bytes());
        }
        self
    }

    pub fn put_volume(&mut self, v: u32) -> &mut Self {
        self.buf.push(TAG_VOLUME);
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn put_proplist(&mut self, props: &Proplist) -> &mut Self {
        self.buf.push(TAG_PROPLIST);
        for (key, value) in props.iter() {
            self.put_string(Some(key));
            self.put_u32(value.len() as u32);
            self.put_arbitrary(value);
        }
        self.put_string(None)
    }

    pub fn put_format_info(&mut self, info: &FormatInfo) -> &mut Self {
        self.buf.push(TAG_FORMAT_INFO);
        self.put_u8(info.encoding);
        self.put_proplist(&info.properties)
    }

    pub fn put_value(&mut self, value: &TagValue) -> &mut Self {
        match value {
            TagValue::String(s) => self.put_string(Some(s)),
            TagValue::Null => self.put_string(None),
            TagValue::U32(v) => self.put_u32(*v),
            TagValue::U8(v) => self.put_u8(*v),
            TagValue::U64(v) => self.put_u64(*v),
            TagValue::S64(v) => self.put_s64(*v),
            TagValue::SampleSpec(s) => self.put_sample_spec(s),
            TagValue::Arbitrary(d) => self.put_arbitrary(d),
            TagValue::Boolean(b) => self.put_bool(*b),
            TagValue::Timeval {
                seconds,
                microseconds,
            } => self.put_timeval(*seconds, *microseconds),
            TagValue::Usec(v) => self.put_usec(*v),
            TagValue::ChannelMap(m) => self.put_channel_map(m),
            TagValue::CVolume(v) => self.put_cvolume(v),
            TagValue::Proplist(p) => self.put_proplist(p),
            TagValue::Volume(v) => self.put_volume(*v),
            TagValue::FormatInfo(f) => self.put_format_info(f),
        }
    }
}

// ── Reader ────────────────────────────────────────────────────────────────────

/// Reads tagged values in order, validating each tag.
#[derive(Debug, Clone)]
pub struct TagStructReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> TagStructReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// True once every value has been read.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::InsufficientData {
                needed: self.pos + n,
                available: self.buf.len(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn peek_tag(&self) -> Result<u8, DecodeError> {
        self.buf
            .get(self.pos)
            .copied()
            .ok_or(DecodeError::InsufficientData {
                needed: self.pos + 1,
                available: self.buf.len(),
            })
    }

    /// Consumes the tag byte if it equals `tag`.  A null marker where a
    /// non-nullable value is expected is reported separately from a plain
    /// type mismatch.  The cursor does not move on failure.
    fn expect_tag(&mut self, tag: u8, expected: &'static str) -> Result<(), DecodeError> {
        let found = self.peek_tag()?;
        if found == tag {
            self.pos += 1;
            Ok(())
        } else if found == TAG_STRING_NULL {
            Err(DecodeError::UnexpectedNull { expected })
        } else {
            Err(DecodeError::WrongTag { expected, found })
        }
    }

    fn raw_u32(&mut self) -> Result<u32, DecodeError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn raw_u64(&mut self) -> Result<u64, DecodeError> {
        let b = self.take(8)?;
        let mut a = [0u8; 8];
        a.copy_from_slice(b);
        Ok(u64::from_be_bytes(a))
    }

    pub fn get_u8(&mut self) -> Result<u8, DecodeError> {
        self.expect_tag(TAG_U8, "u8")?;
        Ok(self.take(1)?[0])
    }

    pub fn get_u32(&mut self) -> Result<u32, DecodeError> {
        self.expect_tag(TAG_U32, "u32")?;
        self.raw_u32()
    }

    pub fn get_u64(&mut self) -> Result<u64, DecodeError> {
        self.expect_tag(TAG_U64, "u64")?;
        self.raw_u64()
    }

    pub fn get_s64(&mut self) -> Result<i64, DecodeError> {
        self.expect_tag(TAG_S64, "s64")?;
        Ok(self.raw_u64()? as i64)
    }

    pub fn get_bool(&mut self) -> Result<bool, DecodeError> {
        match self.peek_tag()? {
            TAG_BOOLEAN_TRUE => {
                self.pos += 1;
                Ok(true)
            }
            TAG_BOOLEAN_FALSE => {
                self.pos += 1;
                Ok(false)
            }
            TAG_STRING_NULL => Err(DecodeError::UnexpectedNull {
                expected: "boolean",
            }),
            found => Err(DecodeError::WrongTag {
                expected: "boolean",
                found,
            }),
        }
    }

    /// Reads a string; the null marker yields `None`.
    pub fn get_string(&mut self) -> Result<Option<String>, DecodeError> {
        match self.peek_tag()? {
            TAG_STRING_NULL => {
                self.pos += 1;
                Ok(None)
            }
            TAG_STRING => {
                self.pos += 1;
                let rest = &self.buf[self.pos..];
                let end = rest
                    .iter()
                    .position(|&b| b == 0)
                    .ok_or_else(|| DecodeError::Malformed("unterminated string".into()))?;
                let s = std::str::from_utf8(&rest[..end])
                    .map_err(|e| DecodeError::Malformed(format!("string is not UTF-8: {e}")))?
                    .to_string();
                self.pos += end + 1;
                Ok(Some(s))
            }
            found => Err(DecodeError::WrongTag {
                expected: "string",
                found,
            }),
        }
    }

    /// Reads a string that must be present.
    pub fn get_string_required(&mut self) -> Result<String, DecodeError> {
        self.get_string()?
            .ok_or(DecodeError::UnexpectedNull { expected: "string" })
    }

    pub fn get_arbitrary(&mut self) -> Result<&'a [u8], DecodeError> {
        self.expect_tag(TAG_ARBITRARY, "arbitrary")?;
        let len = self.raw_u32()? as usize;
        if self.remaining() < len {
            return Err(DecodeError::LengthMismatch {
                declared: len,
                available: self.remaining(),
            });
        }
        self.take(len)
    }

    pub fn get_sample_spec(&mut self) -> Result<SampleSpec, DecodeError> {
        self.expect_tag(TAG_SAMPLE_SPEC, "sample spec")?;
        let head = self.take(2)?;
        let format = SampleFormat::try_from(head[0])?;
        let channels = head[1];
        Ok(SampleSpec {
            format,
            channels,
            rate: self.raw_u32()?,
        })
    }

    pub fn get_timeval(&mut self) -> Result<(u32, u32), DecodeError> {
        self.expect_tag(TAG_TIMEVAL, "timeval")?;
        Ok((self.raw_u32()?, self.raw_u32()?))
    }

    pub fn get_usec(&mut self) -> Result<u64, DecodeError> {
        self.expect_tag(TAG_USEC, "usec")?;
        self.raw_u64()
    }

    fn channel_count(&mut self, what: &'static str) -> Result<usize, DecodeError> {
        let n = self.take(1)?[0];
        if n > CHANNELS_MAX {
            return Err(DecodeError::Malformed(format!(
                "{what} has {n} channels (max {CHANNELS_MAX})"
            )));
        }
        Ok(n as usize)
    }

    pub fn get_channel_map(&mut self) -> Result<ChannelMap, DecodeError> {
        self.expect_tag(TAG_CHANNEL_MAP, "channel map")?;
        let n = self.channel_count("channel map")?;
        Ok(ChannelMap(self.take(n)?.to_vec()))
    }

    pub fn get_cvolume(&mut self) -> Result<CVolume, DecodeError> {
        self.expect_tag(TAG_CVOLUME, "cvolume")?;
        let n = self.channel_count("cvolume")?;
        let mut volumes = Vec::with_capacity(n);
        for _ in 0..n {
            volumes.push(self.raw_u32()?);
        }
        Ok(CVolume(volumes))
    }

    pub fn get_volume(&mut self) -> Result<u32, DecodeError> {
        self.expect_tag(TAG_VOLUME, "volume")?;
        self.raw_u32()
    }

    pub fn get_proplist(&mut self) -> Result<Proplist, DecodeError> {
        self.expect_tag(TAG_PROPLIST, "proplist")?;
        let mut props = Proplist::new();
        while let Some(key) = self.get_string()? {
            let len = self.get_u32()? as usize;
            let value = self.get_arbitrary()?;
            if value.len() != len {
                return Err(DecodeError::LengthMismatch {
                    declared: len,
                    available: value.len(),
                });
            }
            props.set(&key, value.to_vec());
        }
        Ok(props)
    }

    pub fn get_format_info(&mut self) -> Result<FormatInfo, DecodeError> {
        self.expect_tag(TAG_FORMAT_INFO, "format info")?;
        let encoding = self.get_u8()?;
        let properties = self.get_proplist()?;
        Ok(FormatInfo {
            encoding,
            properties,
        })
    }

    /// Reads whatever value comes next.
    pub fn next_value(&mut self) -> Result<TagValue, DecodeError> {
        Ok(match self.peek_tag()? {
            TAG_STRING => TagValue::String(self.get_string_required()?),
            TAG_STRING_NULL => {
                self.pos += 1;
                TagValue::Null
            }
            TAG_U32 => TagValue::U32(self.get_u32()?),
            TAG_U8 => TagValue::U8(self.get_u8()?),
            TAG_U64 => TagValue::U64(self.get_u64()?),
            TAG_S64 => TagValue::S64(self.get_s64()?),
            TAG_SAMPLE_SPEC => TagValue::SampleSpec(self.get_sample_spec()?),
            TAG_ARBITRARY => TagValue::Arbitrary(self.get_arbitrary()?.to_vec()),
            TAG_BOOLEAN_TRUE | TAG_BOOLEAN_FALSE => TagValue::Boolean(self.get_bool()?),
            TAG_TIMEVAL => {
                let (seconds, microseconds) = self.get_timeval()?;
                TagValue::Timeval {
                    seconds,
                    microseconds,
                }
            }
            TAG_USEC => TagValue::Usec(self.get_usec()?),
            TAG_CHANNEL_MAP => TagValue::ChannelMap(self.get_channel_map()?),
            TAG_CVOLUME => TagValue::CVolume(self.get_cvolume()?),
            TAG_PROPLIST => TagValue::Proplist(self.get_proplist()?),
            TAG_VOLUME => TagValue::Volume(self.get_volume()?),
            TAG_FORMAT_INFO => TagValue::FormatInfo(self.get_format_info()?),
            other => {
                return Err(DecodeError::UnknownDiscriminant {
                    what: "tag",
                    value: other as u32,
                })
            }
        })
    }

    /// Reads every remaining value.
    pub fn read_all(&mut self) -> Result<Vec<TagValue>, DecodeError> {
        let mut values = Vec::new();
        while !self.is_empty() {
            values.push(self.next_value()?);
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo() -> SampleSpec {
        SampleSpec {
            format: SampleFormat::S16Le,
            channels: 2,
            rate: 44_100,
        }
    }

    #[test]
    fn test_u32_is_tagged_big_endian() {
        let mut w = TagStructWriter::new();
        w.put_u32(0x0102_0304);
        assert_eq!(w.as_bytes(), &[b'L', 1, 2, 3, 4]);
    }

    #[test]
    fn test_string_and_null_layout() {
        let mut w = TagStructWriter::new();
        w.put_string(Some("hi")).put_string(None);
        assert_eq!(w.as_bytes(), &[b't', b'h', b'i', 0, b'N']);
    }

    #[test]
    fn test_wrong_tag_is_distinguished_from_null() {
        // Arrange
        let mut w = TagStructWriter::new();
        w.put_u8(5).put_string(None);
        let bytes = w.into_bytes();
        let mut r = TagStructReader::new(&bytes);

        // Act / Assert – a u8 where a u32 is expected is a type error
        assert_eq!(
            r.get_u32(),
            Err(DecodeError::WrongTag {
                expected: "u32",
                found: b'B'
            })
        );
        assert_eq!(r.get_u8(), Ok(5));

        // A null where a u32 is expected is reported as null
        let mut probe = r.clone();
        assert_eq!(
            probe.get_u32(),
            Err(DecodeError::UnexpectedNull { expected: "u32" })
        );

        // And a null where a string is expected is a valid absent value
        assert_eq!(r.get_string(), Ok(None));
        assert!(r.is_empty());
    }

    #[test]
    fn test_sample_spec_layout() {
        let mut w = TagStructWriter::new();
        w.put_sample_spec(&stereo());
        assert_eq!(w.as_bytes(), &[b'a', 3, 2, 0, 0, 0xAC, 0x44]);
        assert_eq!(stereo().frame_size(), 4);
        assert_eq!(stereo().bytes_per_second(), 176_400);
    }

    #[test]
    fn test_proplist_layout_and_terminator() {
        // Arrange
        let mut props = Proplist::new();
        props.set_str(Proplist::APPLICATION_NAME, "a");

        // Act
        let mut w = TagStructWriter::new();
        w.put_proplist(&props);

        // Assert
        let mut expected = vec![b'P', b't'];
        expected.extend_from_slice(b"application.name\0");
        expected.extend_from_slice(&[b'L', 0, 0, 0, 2]);
        expected.extend_from_slice(&[b'x', 0, 0, 0, 2, b'a', 0]);
        expected.push(b'N');
        assert_eq!(w.as_bytes(), expected.as_slice());

        let mut r = TagStructReader::new(w.as_bytes());
        let back = r.get_proplist().unwrap();
        assert_eq!(back.get_str(Proplist::APPLICATION_NAME), Some("a"));
    }

    #[test]
    fn test_proplist_length_mismatch_is_rejected() {
        let mut w = TagStructWriter::new();
        w.buf.push(TAG_PROPLIST);
        w.put_string(Some("k")).put_u32(3).put_arbitrary(b"ab").put_string(None);
        let mut r = TagStructReader::new(w.as_bytes());
        assert!(matches!(
            r.get_proplist(),
            Err(DecodeError::LengthMismatch { declared: 3, .. })
        ));
    }

    #[test]
    fn test_every_value_kind_round_trips() {
        // Arrange
        let mut props = Proplist::new();
        props.set_str(Proplist::MEDIA_NAME, "tone");
        props.set("binary", vec![0, 1, 2]);
        let values = vec![
            TagValue::String("name".into()),
            TagValue::Null,
            TagValue::U32(u32::MAX),
            TagValue::U8(7),
            TagValue::U64(1 << 40),
            TagValue::S64(-12),
            TagValue::SampleSpec(stereo()),
            TagValue::Arbitrary(vec![9; 256]),
            TagValue::Boolean(true),
            TagValue::Boolean(false),
            TagValue::Timeval {
                seconds: 10,
                microseconds: 20,
            },
            TagValue::Usec(123_456),
            TagValue::ChannelMap(ChannelMap::default_for(2)),
            TagValue::CVolume(CVolume::uniform(2, VOLUME_NORM)),
            TagValue::Proplist(props.clone()),
            TagValue::Volume(VOLUME_NORM),
            TagValue::FormatInfo(FormatInfo {
                encoding: FormatInfo::ENCODING_PCM,
                properties: props,
            }),
        ];

        // Act
        let mut w = TagStructWriter::new();
        for v in &values {
            w.put_value(v);
        }
        let bytes = w.into_bytes();
        let decoded = TagStructReader::new(&bytes).read_all().unwrap();

        // Assert
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_truncated_arbitrary_is_rejected() {
        let bytes = [b'x', 0, 0, 0, 10, 1, 2];
        assert!(matches!(
            TagStructReader::new(&bytes).get_arbitrary(),
            Err(DecodeError::LengthMismatch {
                declared: 10,
                available: 2
            })
        ));
    }

    #[test]
    fn test_unknown_sample_format_is_rejected() {
        let bytes = [b'a', 99, 2, 0, 0, 0, 1];
        assert!(matches!(
            TagStructReader::new(&bytes).get_sample_spec(),
            Err(DecodeError::UnknownDiscriminant { value: 99, .. })
        ));
    }

    #[test]
    fn test_unterminated_string_is_rejected() {
        let bytes = [b't', b'a', b'b'];
        assert!(matches!(
            TagStructReader::new(&bytes).get_string(),
            Err(DecodeError::Malformed(_))
        ));
    }
}
