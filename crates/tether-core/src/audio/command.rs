//! Commands, error codes, and the request/reply layouts this client uses.
//!
//! Every request carries a tag chosen by the client; the server answers with
//! a `REPLY` or `ERROR` packet carrying the same tag.  Notifications the
//! server sends on its own use tag `0xFFFFFFFF`.
//!
//! Argument lists grow with the protocol version.  CreatePlaybackStream has
//! the longest list, so its fields are described once in a table of
//! `(first version, last version, field)` rows, and the encoder walks exactly
//! the rows that apply to the negotiated version.

use crate::audio::descriptor::Packet;
use crate::audio::tagstruct::{
    CVolume, ChannelMap, FormatInfo, Proplist, SampleSpec, TagStructWriter, VOLUME_NORM,
};
use crate::error::DecodeError;

/// The protocol version this client declares.
pub const PROTOCOL_VERSION: u32 = 32;

/// Oldest server version this client can talk to.
pub const MIN_SERVER_VERSION: u32 = 8;

/// Low bits of the version word carry the version; high bits carry flags.
pub const VERSION_MASK: u32 = 0x0000_FFFF;
pub const FLAG_SHM: u32 = 0x8000_0000;
pub const FLAG_MEMFD: u32 = 0x4000_0000;

/// "No index" / "no value" for u32 fields.
pub const INVALID_INDEX: u32 = u32::MAX;

/// Tag of packets the server sends unprompted.
pub const NOTIFICATION_TAG: u32 = u32::MAX;

// ── Commands ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Command {
    Error = 0,
    Timeout = 1,
    Reply = 2,
    CreatePlaybackStream = 3,
    DeletePlaybackStream = 4,
    Auth = 8,
    SetClientName = 9,
    DrainPlaybackStream = 12,
    Subscribe = 35,
    CorkPlaybackStream = 41,
    Request = 61,
    Overflow = 62,
    Underflow = 63,
    PlaybackStreamKilled = 64,
    SubscribeEvent = 66,
    Started = 86,
}

impl TryFrom<u32> for Command {
    type Error = DecodeError;

    fn try_from(value: u32) -> Result<Self, DecodeError> {
        Ok(match value {
            0 => Command::Error,
            1 => Command::Timeout,
            2 => Command::Reply,
            3 => Command::CreatePlaybackStream,
            4 => Command::DeletePlaybackStream,
            8 => Command::Auth,
            9 => Command::SetClientName,
            12 => Command::DrainPlaybackStream,
            35 => Command::Subscribe,
            41 => Command::CorkPlaybackStream,
            61 => Command::Request,
            62 => Command::Overflow,
            63 => Command::Underflow,
            64 => Command::PlaybackStreamKilled,
            66 => Command::SubscribeEvent,
            86 => Command::Started,
            other => {
                return Err(DecodeError::UnknownDiscriminant {
                    what: "command",
                    value: other,
                })
            }
        })
    }
}

// ── Error codes ───────────────────────────────────────────────────────────────

/// Error codes the server puts in an `ERROR` packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    Ok = 0,
    Access = 1,
    Command = 2,
    Invalid = 3,
    Exist = 4,
    NoEntity = 5,
    ConnectionRefused = 6,
    Protocol = 7,
    Timeout = 8,
    AuthKey = 9,
    Internal = 10,
    ConnectionTerminated = 11,
    Killed = 12,
    InvalidServer = 13,
    ModuleInitFailed = 14,
    BadState = 15,
    NoData = 16,
    Version = 17,
    TooLarge = 18,
    NotSupported = 19,
    Unknown = 20,
    NoExtension = 21,
    Obsolete = 22,
    NotImplemented = 23,
    Forked = 24,
    Io = 25,
    Busy = 26,
}

impl ErrorCode {
    const ALL: [ErrorCode; 27] = [
        ErrorCode::Ok,
        ErrorCode::Access,
        ErrorCode::Command,
        ErrorCode::Invalid,
        ErrorCode::Exist,
        ErrorCode::NoEntity,
        ErrorCode::ConnectionRefused,
        ErrorCode::Protocol,
        ErrorCode::Timeout,
        ErrorCode::AuthKey,
        ErrorCode::Internal,
        ErrorCode::ConnectionTerminated,
        ErrorCode::Killed,
        ErrorCode::InvalidServer,
        ErrorCode::ModuleInitFailed,
        ErrorCode::BadState,
        ErrorCode::NoData,
        ErrorCode::Version,
        ErrorCode::TooLarge,
        ErrorCode::NotSupported,
        ErrorCode::Unknown,
        ErrorCode::NoExtension,
        ErrorCode::Obsolete,
        ErrorCode::NotImplemented,
        ErrorCode::Forked,
        ErrorCode::Io,
        ErrorCode::Busy,
    ];

    pub fn description(self) -> &'static str {
        match self {
            ErrorCode::Ok => "success",
            ErrorCode::Access => "access denied",
            ErrorCode::Command => "unknown command",
            ErrorCode::Invalid => "invalid argument",
            ErrorCode::Exist => "entity exists",
            ErrorCode::NoEntity => "no such entity",
            ErrorCode::ConnectionRefused => "connection refused",
            ErrorCode::Protocol => "protocol error",
            ErrorCode::Timeout => "timeout",
            ErrorCode::AuthKey => "no authentication key",
            ErrorCode::Internal => "internal error",
            ErrorCode::ConnectionTerminated => "connection terminated",
            ErrorCode::Killed => "entity killed",
            ErrorCode::InvalidServer => "invalid server",
            ErrorCode::ModuleInitFailed => "module initialization failed",
            ErrorCode::BadState => "bad state",
            ErrorCode::NoData => "no data",
            ErrorCode::Version => "incompatible protocol version",
            ErrorCode::TooLarge => "too large",
            ErrorCode::NotSupported => "not supported",
            ErrorCode::Unknown => "unknown error code",
            ErrorCode::NoExtension => "no such extension",
            ErrorCode::Obsolete => "obsolete functionality",
            ErrorCode::NotImplemented => "missing implementation",
            ErrorCode::Forked => "client forked",
            ErrorCode::Io => "input/output error",
            ErrorCode::Busy => "device or resource busy",
        }
    }
}

impl TryFrom<u32> for ErrorCode {
    type Error = DecodeError;

    fn try_from(value: u32) -> Result<Self, DecodeError> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(DecodeError::UnknownDiscriminant {
                what: "error code",
                value,
            })
    }
}

// ── Generic replies ───────────────────────────────────────────────────────────

/// A `REPLY` packet for `tag`.
pub fn reply(tag: u32, body: TagStructWriter) -> Packet {
    Packet::new(Command::Reply, tag, body)
}

/// An `ERROR` packet for `tag`.
pub fn error_reply(tag: u32, code: ErrorCode) -> Packet {
    let mut body = TagStructWriter::new();
    body.put_u32(code as u32);
    Packet::new(Command::Error, tag, body)
}

/// The raw error code carried by an `ERROR` packet.
pub fn decode_error_code(packet: &Packet) -> Result<u32, DecodeError> {
    packet.reader().get_u32()
}

// ── Auth and client name ──────────────────────────────────────────────────────

pub fn auth(tag: u32, cookie: &[u8]) -> Packet {
    let mut body = TagStructWriter::new();
    body.put_u32(PROTOCOL_VERSION).put_arbitrary(cookie);
    Packet::new(Command::Auth, tag, body)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthReply {
    /// Server protocol version, flags removed.
    pub server_version: u32,
    pub shm: bool,
    pub memfd: bool,
}

impl AuthReply {
    pub fn decode(packet: &Packet) -> Result<Self, DecodeError> {
        let word = packet.reader().get_u32()?;
        Ok(Self {
            server_version: word & VERSION_MASK,
            shm: word & FLAG_SHM != 0,
            memfd: word & FLAG_MEMFD != 0,
        })
    }

    /// The version both sides speak.
    pub fn negotiated_version(&self) -> u32 {
        self.server_version.min(PROTOCOL_VERSION)
    }

    pub fn to_packet(&self, tag: u32) -> Packet {
        let mut word = self.server_version;
        if self.shm {
            word |= FLAG_SHM;
        }
        if self.memfd {
            word |= FLAG_MEMFD;
        }
        let mut body = TagStructWriter::new();
        body.put_u32(word);
        reply(tag, body)
    }
}

/// Sends the client's properties (version 13 and later) or just its name.
pub fn set_client_name(tag: u32, version: u32, props: &Proplist) -> Packet {
    let mut body = TagStructWriter::new();
    if version >= 13 {
        body.put_proplist(props);
    } else {
        body.put_string(props.get_str(Proplist::APPLICATION_NAME));
    }
    Packet::new(Command::SetClientName, tag, body)
}

/// The client index the server assigned, when the version reports one.
pub fn decode_set_client_name_reply(
    packet: &Packet,
    version: u32,
) -> Result<Option<u32>, DecodeError> {
    if version >= 13 {
        packet.reader().get_u32().map(Some)
    } else {
        Ok(None)
    }
}

// ── Playback streams ──────────────────────────────────────────────────────────

/// Server-side buffering.  `INVALID_INDEX` in any field lets the server pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferAttr {
    pub max_length: u32,
    pub target_length: u32,
    pub prebuf: u32,
    pub min_request: u32,
}

impl Default for BufferAttr {
    fn default() -> Self {
        Self {
            max_length: INVALID_INDEX,
            target_length: INVALID_INDEX,
            prebuf: INVALID_INDEX,
            min_request: INVALID_INDEX,
        }
    }
}

/// Boolean stream options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamFlags {
    pub no_remap_channels: bool,
    pub no_remix_channels: bool,
    pub fix_format: bool,
    pub fix_rate: bool,
    pub fix_channels: bool,
    pub dont_move: bool,
    pub variable_rate: bool,
    pub adjust_latency: bool,
    pub early_requests: bool,
    pub dont_inhibit_auto_suspend: bool,
    pub fail_on_suspend: bool,
    pub relative_volume: bool,
    pub passthrough: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackStreamParams {
    pub name: String,
    pub sample_spec: SampleSpec,
    pub channel_map: ChannelMap,
    pub sink_index: u32,
    pub sink_name: Option<String>,
    pub buffer_attr: BufferAttr,
    pub corked: bool,
    pub sync_id: u32,
    /// `None` leaves the volume to the server.
    pub volume: Option<CVolume>,
    pub muted: Option<bool>,
    pub flags: StreamFlags,
    pub properties: Proplist,
    pub formats: Vec<FormatInfo>,
}

impl PlaybackStreamParams {
    /// A stream on the default sink with server-chosen buffering.
    pub fn new(name: &str, sample_spec: SampleSpec) -> Self {
        let mut properties = Proplist::new();
        properties.set_str(Proplist::MEDIA_NAME, name);
        Self {
            name: name.to_string(),
            channel_map: ChannelMap::default_for(sample_spec.channels),
            sample_spec,
            sink_index: INVALID_INDEX,
            sink_name: None,
            buffer_attr: BufferAttr::default(),
            corked: false,
            sync_id: 0,
            volume: None,
            muted: None,
            flags: StreamFlags::default(),
            properties,
            formats: Vec::new(),
        }
    }
}

/// One argument of CreatePlaybackStream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamField {
    Name,
    SampleSpec,
    ChannelMap,
    SinkIndex,
    SinkName,
    MaxLength,
    Corked,
    TargetLength,
    Prebuf,
    MinRequest,
    SyncId,
    Volume,
    NoRemapChannels,
    NoRemixChannels,
    FixFormat,
    FixRate,
    FixChannels,
    DontMove,
    VariableRate,
    Muted,
    AdjustLatency,
    Proplist,
    VolumeSet,
    EarlyRequests,
    MutedSet,
    DontInhibitAutoSuspend,
    FailOnSuspend,
    RelativeVolume,
    Passthrough,
    Formats,
}

const ANY: u32 = u32::MAX;

/// `(first version, last version, field)`, in wire order.
const CREATE_PLAYBACK_STREAM_FIELDS: &[(u32, u32, StreamField)] = &[
    (0, 12, StreamField::Name),
    (0, ANY, StreamField::SampleSpec),
    (0, ANY, StreamField::ChannelMap),
    (0, ANY, StreamField::SinkIndex),
    (0, ANY, StreamField::SinkName),
    (0, ANY, StreamField::MaxLength),
    (0, ANY, StreamField::Corked),
    (0, ANY, StreamField::TargetLength),
    (0, ANY, StreamField::Prebuf),
    (0, ANY, StreamField::MinRequest),
    (0, ANY, StreamField::SyncId),
    (0, ANY, StreamField::Volume),
    (12, ANY, StreamField::NoRemapChannels),
    (12, ANY, StreamField::NoRemixChannels),
    (12, ANY, StreamField::FixFormat),
    (12, ANY, StreamField::FixRate),
    (12, ANY, StreamField::FixChannels),
    (12, ANY, StreamField::DontMove),
    (12, ANY, StreamField::VariableRate),
    (13, ANY, StreamField::Muted),
    (13, ANY, StreamField::AdjustLatency),
    (13, ANY, StreamField::Proplist),
    (14, ANY, StreamField::VolumeSet),
    (14, ANY, StreamField::EarlyRequests),
    (15, ANY, StreamField::MutedSet),
    (15, ANY, StreamField::DontInhibitAutoSuspend),
    (15, ANY, StreamField::FailOnSuspend),
    (17, ANY, StreamField::RelativeVolume),
    (18, ANY, StreamField::Passthrough),
    (21, ANY, StreamField::Formats),
];

/// The CreatePlaybackStream fields sent at `version`, in wire order.
pub fn playback_stream_fields(version: u32) -> Vec<StreamField> {
    CREATE_PLAYBACK_STREAM_FIELDS
        .iter()
        .filter(|(first, last, _)| (*first..=*last).contains(&version))
        .map(|(_, _, field)| *field)
        .collect()
}

pub fn create_playback_stream(tag: u32, version: u32, p: &PlaybackStreamParams) -> Packet {
    let volume = p
        .volume
        .clone()
        .unwrap_or_else(|| CVolume::uniform(p.sample_spec.channels, VOLUME_NORM));
    let mut body = TagStructWriter::new();
    for field in playback_stream_fields(version) {
        match field {
            StreamField::Name => body.put_string(Some(&p.name)),
            StreamField::SampleSpec => body.put_sample_spec(&p.sample_spec),
            StreamField::ChannelMap => body.put_channel_map(&p.channel_map),
            StreamField::SinkIndex => body.put_u32(p.sink_index),
            StreamField::SinkName => body.put_string(p.sink_name.as_deref()),
            StreamField::MaxLength => body.put_u32(p.buffer_attr.max_length),
            StreamField::Corked => body.put_bool(p.corked),
            StreamField::TargetLength => body.put_u32(p.buffer_attr.target_length),
            StreamField::Prebuf => body.put_u32(p.buffer_attr.prebuf),
            StreamField::MinRequest => body.put_u32(p.buffer_attr.min_request),
            StreamField::SyncId => body.put_u32(p.sync_id),
            StreamField::Volume => body.put_cvolume(&volume),
            StreamField::NoRemapChannels => body.put_bool(p.flags.no_remap_channels),
            StreamField::NoRemixChannels => body.put_bool(p.flags.no_remix_channels),
            StreamField::FixFormat => body.put_bool(p.flags.fix_format),
            StreamField::FixRate => body.put_bool(p.flags.fix_rate),
            StreamField::FixChannels => body.put_bool(p.flags.fix_channels),
            StreamField::DontMove => body.put_bool(p.flags.dont_move),
            StreamField::VariableRate => body.put_bool(p.flags.variable_rate),
            StreamField::Muted => body.put_bool(p.muted.unwrap_or(false)),
            StreamField::AdjustLatency => body.put_bool(p.flags.adjust_latency),
            StreamField::Proplist => body.put_proplist(&p.properties),
            StreamField::VolumeSet => body.put_bool(p.volume.is_some()),
            StreamField::EarlyRequests => body.put_bool(p.flags.early_requests),
            StreamField::MutedSet => body.put_bool(p.muted.is_some()),
            StreamField::DontInhibitAutoSuspend => body.put_bool(p.flags.dont_inhibit_auto_suspend),
            StreamField::FailOnSuspend => body.put_bool(p.flags.fail_on_suspend),
            StreamField::RelativeVolume => body.put_bool(p.flags.relative_volume),
            StreamField::Passthrough => body.put_bool(p.flags.passthrough),
            StreamField::Formats => {
                body.put_u8(p.formats.len() as u8);
                for f in &p.formats {
                    body.put_format_info(f);
                }
                &mut body
            }
        };
    }
    Packet::new(Command::CreatePlaybackStream, tag, body)
}

/// Where the server placed a new stream (version 12 and later).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamPlacement {
    pub sample_spec: SampleSpec,
    pub channel_map: ChannelMap,
    pub sink_index: u32,
    pub sink_name: Option<String>,
    pub suspended: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePlaybackStreamReply {
    /// Channel number for memblock frames and later stream commands.
    pub channel: u32,
    pub stream_index: u32,
    /// Bytes the server is ready to accept immediately.
    pub requested_bytes: u32,
    pub buffer_attr: Option<BufferAttr>,
    pub placement: Option<StreamPlacement>,
    pub sink_latency_usec: Option<u64>,
    pub format: Option<FormatInfo>,
}

impl CreatePlaybackStreamReply {
    pub fn decode(packet: &Packet, version: u32) -> Result<Self, DecodeError> {
        let mut r = packet.reader();
        let channel = r.get_u32()?;
        let stream_index = r.get_u32()?;
        let requested_bytes = r.get_u32()?;
        let buffer_attr = if version >= 9 {
            Some(BufferAttr {
                max_length: r.get_u32()?,
                target_length: r.get_u32()?,
                prebuf: r.get_u32()?,
                min_request: r.get_u32()?,
            })
        } else {
            None
        };
        let placement = if version >= 12 {
            Some(StreamPlacement {
                sample_spec: r.get_sample_spec()?,
                channel_map: r.get_channel_map()?,
                sink_index: r.get_u32()?,
                sink_name: r.get_string()?,
                suspended: r.get_bool()?,
            })
        } else {
            None
        };
        let sink_latency_usec = if version >= 13 {
            Some(r.get_usec()?)
        } else {
            None
        };
        let format = if version >= 21 {
            Some(r.get_format_info()?)
        } else {
            None
        };
        Ok(Self {
            channel,
            stream_index,
            requested_bytes,
            buffer_attr,
            placement,
            sink_latency_usec,
            format,
        })
    }

    /// Encodes the reply as a server speaking `version` would.
    pub fn to_packet(&self, tag: u32, version: u32) -> Packet {
        let mut body = TagStructWriter::new();
        body.put_u32(self.channel)
            .put_u32(self.stream_index)
            .put_u32(self.requested_bytes);
        if version >= 9 {
            let a = self.buffer_attr.unwrap_or_default();
            body.put_u32(a.max_length)
                .put_u32(a.target_length)
                .put_u32(a.prebuf)
                .put_u32(a.min_request);
        }
        if version >= 12 {
            if let Some(pl) = &self.placement {
                body.put_sample_spec(&pl.sample_spec)
                    .put_channel_map(&pl.channel_map)
                    .put_u32(pl.sink_index)
                    .put_string(pl.sink_name.as_deref())
                    .put_bool(pl.suspended);
            }
        }
        if version >= 13 {
            body.put_usec(self.sink_latency_usec.unwrap_or(0));
        }
        if version >= 21 {
            body.put_format_info(&self.format.clone().unwrap_or_else(FormatInfo::pcm));
        }
        reply(tag, body)
    }
}

fn channel_body(channel: u32) -> TagStructWriter {
    let mut body = TagStructWriter::new();
    body.put_u32(channel);
    body
}

pub fn delete_playback_stream(tag: u32, channel: u32) -> Packet {
    Packet::new(Command::DeletePlaybackStream, tag, channel_body(channel))
}

/// Asks for a reply once everything written so far has been played.
pub fn drain_playback_stream(tag: u32, channel: u32) -> Packet {
    Packet::new(Command::DrainPlaybackStream, tag, channel_body(channel))
}

pub fn cork_playback_stream(tag: u32, channel: u32, cork: bool) -> Packet {
    let mut body = channel_body(channel);
    body.put_bool(cork);
    Packet::new(Command::CorkPlaybackStream, tag, body)
}

/// Subscription mask bits.
pub mod subscription {
    pub const SINK: u32 = 0x0001;
    pub const SOURCE: u32 = 0x0002;
    pub const SINK_INPUT: u32 = 0x0004;
    pub const CLIENT: u32 = 0x0020;
    pub const SERVER: u32 = 0x0080;
}

pub fn subscribe(tag: u32, mask: u32) -> Packet {
    let mut body = TagStructWriter::new();
    body.put_u32(mask);
    Packet::new(Command::Subscribe, tag, body)
}

// ── Notifications ─────────────────────────────────────────────────────────────

/// A packet the server sent without being asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The stream can take `bytes` more bytes.
    Request { channel: u32, bytes: u32 },
    Overflow { channel: u32 },
    /// Playback ran dry.  Servers at version 23 and later report the write
    /// index where it happened.
    Underflow { channel: u32, offset: Option<i64> },
    Started { channel: u32 },
    PlaybackStreamKilled { channel: u32 },
    SubscribeEvent { event: u32, index: u32 },
    /// A command this client does not interpret, kept whole.
    Unknown { command: u32, tag: u32, body: Vec<u8> },
}

impl Notification {
    pub fn decode(packet: &Packet) -> Result<Self, DecodeError> {
        let mut r = packet.reader();
        Ok(match packet.known_command() {
            Some(Command::Request) => Notification::Request {
                channel: r.get_u32()?,
                bytes: r.get_u32()?,
            },
            Some(Command::Overflow) => Notification::Overflow {
                channel: r.get_u32()?,
            },
            Some(Command::Underflow) => {
                let channel = r.get_u32()?;
                let offset = if r.is_empty() { None } else { Some(r.get_s64()?) };
                Notification::Underflow { channel, offset }
            }
            Some(Command::Started) => Notification::Started {
                channel: r.get_u32()?,
            },
            Some(Command::PlaybackStreamKilled) => Notification::PlaybackStreamKilled {
                channel: r.get_u32()?,
            },
            Some(Command::SubscribeEvent) => Notification::SubscribeEvent {
                event: r.get_u32()?,
                index: r.get_u32()?,
            },
            _ => Notification::Unknown {
                command: packet.command,
                tag: packet.tag,
                body: packet.body.clone(),
            },
        })
    }

    /// The stream channel the notification concerns, if any.
    pub fn channel(&self) -> Option<u32> {
        match self {
            Notification::Request { channel, .. }
            | Notification::Overflow { channel }
            | Notification::Underflow { channel, .. }
            | Notification::Started { channel }
            | Notification::PlaybackStreamKilled { channel } => Some(*channel),
            _ => None,
        }
    }

    pub fn to_packet(&self) -> Packet {
        let mut body = TagStructWriter::new();
        let command = match self {
            Notification::Request { channel, bytes } => {
                body.put_u32(*channel).put_u32(*bytes);
                Command::Request
            }
            Notification::Overflow { channel } => {
                body.put_u32(*channel);
                Command::Overflow
            }
            Notification::Underflow { channel, offset } => {
                body.put_u32(*channel);
                if let Some(o) = offset {
                    body.put_s64(*o);
                }
                Command::Underflow
            }
            Notification::Started { channel } => {
                body.put_u32(*channel);
                Command::Started
            }
            Notification::PlaybackStreamKilled { channel } => {
                body.put_u32(*channel);
                Command::PlaybackStreamKilled
            }
            Notification::SubscribeEvent { event, index } => {
                body.put_u32(*event).put_u32(*index);
                Command::SubscribeEvent
            }
            Notification::Unknown { command, tag, body } => {
                return Packet {
                    command: *command,
                    tag: *tag,
                    body: body.clone(),
                }
            }
        };
        Packet::new(command, NOTIFICATION_TAG, body)
    }
}
