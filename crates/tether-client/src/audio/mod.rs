//! Audio connections.
//!
//! An [`AudioConnection`] authenticates with the cookie, announces the
//! client's name, and then manages playback streams.  Every control command
//! carries a tag; the server echoes it in the `REPLY` or `ERROR` it sends
//! back.  Sample data travels in memblock frames addressed by the stream's
//! channel and consumes no tag.

pub mod protocol;

use tether_core::audio::command::{
    self, AuthReply, CreatePlaybackStreamReply, PlaybackStreamParams, MIN_SERVER_VERSION,
};
use tether_core::audio::descriptor::{encode_memblocks, encode_packet};
use tether_core::audio::tagstruct::Proplist;
use tether_core::audio::{AudioFrame, ErrorCode, Notification, Packet, SampleSpec};
use tether_core::{Cookie, DecodeError, EncodeError};
use tokio::net::UnixStream;
use tracing::{debug, info, warn};

use crate::config::AudioConfig;
use crate::engine::{Engine, EventConsumer};
use crate::error::ClientError;
use crate::infrastructure::{address, credential_store};

pub use protocol::AudioProtocol;

/// A playback stream created on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackStream {
    /// Channel that memblock frames and stream commands address.
    pub channel: u32,
    pub stream_index: u32,
    /// Bytes the server asked for up front.
    pub requested_bytes: u32,
    /// The format the server actually uses, which may differ from the one
    /// requested on older servers.
    pub sample_spec: SampleSpec,
    pub sink_index: Option<u32>,
}

/// An open audio session.
pub struct AudioConnection {
    engine: Engine<AudioProtocol>,
    version: u32,
    client_index: Option<u32>,
}

fn into_reply(frame: AudioFrame) -> Result<Packet, ClientError> {
    match frame {
        AudioFrame::Packet(p) if p.known_command() == Some(command::Command::Error) => {
            Err(protocol::server_error(&p))
        }
        AudioFrame::Packet(p) => Ok(p),
        AudioFrame::Memblock(_) => Err(ClientError::Decode(DecodeError::Malformed(
            "sample data where a reply was expected".into(),
        ))),
    }
}

/// The notification a frame carries, if it is one.
pub fn notification_of(frame: &AudioFrame) -> Option<Result<Notification, DecodeError>> {
    match frame {
        AudioFrame::Packet(p) => match p.known_command() {
            Some(command::Command::Reply) | Some(command::Command::Error) => None,
            _ => Some(Notification::decode(p)),
        },
        AudioFrame::Memblock(_) => None,
    }
}

impl AudioConnection {
    /// Finds the server socket and cookie from `config` and the environment,
    /// connects to the first socket that accepts, and authenticates.
    pub async fn connect(config: &AudioConfig) -> Result<Self, ClientError> {
        let candidates = address::audio_socket_candidates(
            config.server.as_deref(),
            address::process_env,
            address::current_uid(),
        )?;
        let cookie = credential_store::load_cookie(&credential_store::cookie_paths(
            config.cookie.as_deref(),
            address::process_env,
        ));

        let mut last_error = None;
        for path in &candidates {
            match UnixStream::connect(path).await {
                Ok(stream) => {
                    debug!(
                        socket = %path.display(),
                        anonymous = cookie.is_anonymous(),
                        "connecting"
                    );
                    return Self::handshake(stream, &cookie, &config.client_name).await;
                }
                Err(e) => {
                    debug!(socket = %path.display(), error = %e, "audio socket not reachable");
                    last_error = Some(e);
                }
            }
        }
        Err(ClientError::AddressResolution {
            address: candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(" "),
            reason: match last_error {
                Some(e) => format!("no socket accepted a connection: {e}"),
                None => "no candidate sockets".to_string(),
            },
        })
    }

    /// Authenticates and names the client on an already connected socket.
    pub async fn handshake(
        stream: UnixStream,
        cookie: &Cookie,
        client_name: &str,
    ) -> Result<Self, ClientError> {
        let engine = Engine::<AudioProtocol>::new(stream, 0);

        let answer = engine
            .round_trip(|tag| Ok(encode_packet(&command::auth(tag as u32, cookie.as_bytes()))))
            .await?;
        let auth = match into_reply(answer) {
            Ok(packet) => AuthReply::decode(&packet)?,
            Err(ClientError::Server {
                code, description, ..
            }) => {
                let reason = format!("authentication refused: {description}");
                return Err(match ErrorCode::try_from(code) {
                    Ok(ErrorCode::Access) | Ok(ErrorCode::AuthKey) => {
                        ClientError::AuthRequired { reason }
                    }
                    _ => ClientError::ProtocolRejected { reason },
                });
            }
            Err(e) => return Err(e),
        };
        if auth.server_version < MIN_SERVER_VERSION {
            return Err(ClientError::ProtocolRejected {
                reason: format!(
                    "server protocol version {} is older than {MIN_SERVER_VERSION}",
                    auth.server_version
                ),
            });
        }
        let version = auth.negotiated_version();

        let mut props = Proplist::new();
        props.set_str(Proplist::APPLICATION_NAME, client_name);
        let answer = engine
            .round_trip(|tag| {
                Ok(encode_packet(&command::set_client_name(
                    tag as u32, version, &props,
                )))
            })
            .await?;
        let client_index = command::decode_set_client_name_reply(&into_reply(answer)?, version)?;

        info!(
            server_version = auth.server_version,
            version,
            shm = auth.shm,
            memfd = auth.memfd,
            client_index = ?client_index,
            "audio session established"
        );
        Ok(Self {
            engine,
            version,
            client_index,
        })
    }

    /// The protocol version both sides speak.
    pub fn protocol_version(&self) -> u32 {
        self.version
    }

    pub fn client_index(&self) -> Option<u32> {
        self.client_index
    }

    async fn command(
        &self,
        build: impl FnOnce(u32) -> Packet,
    ) -> Result<Packet, ClientError> {
        let frame = self
            .engine
            .round_trip(|tag| Ok(encode_packet(&build(tag as u32))))
            .await?;
        into_reply(frame)
    }

    // ── Playback streams ──────────────────────────────────────────────────────

    pub async fn create_playback_stream(
        &self,
        params: &PlaybackStreamParams,
    ) -> Result<PlaybackStream, ClientError> {
        let version = self.version;
        let packet = self
            .command(|tag| command::create_playback_stream(tag, version, params))
            .await?;
        let reply = CreatePlaybackStreamReply::decode(&packet, version)?;
        let stream = PlaybackStream {
            channel: reply.channel,
            stream_index: reply.stream_index,
            requested_bytes: reply.requested_bytes,
            sample_spec: reply
                .placement
                .as_ref()
                .map_or(params.sample_spec, |p| p.sample_spec),
            sink_index: reply.placement.as_ref().map(|p| p.sink_index),
        };
        debug!(
            channel = stream.channel,
            index = stream.stream_index,
            requested_bytes = stream.requested_bytes,
            "playback stream created"
        );
        Ok(stream)
    }

    /// Queues samples on `stream`.  `data` must hold whole frames of the
    /// stream's sample format; it is split into memblock frames of at most
    /// 64 KiB.  Returns the number of frames written.
    pub async fn write(&self, stream: &PlaybackStream, data: &[u8]) -> Result<usize, ClientError> {
        let frame_size = stream.sample_spec.frame_size();
        if frame_size == 0 || data.len() % frame_size != 0 {
            return Err(ClientError::Encode(EncodeError::FieldOutOfRange {
                field: "sample data length",
                value: data.len() as u64,
            }));
        }
        let frames = encode_memblocks(stream.channel, data);
        self.engine.send_raw(&frames).await?;
        Ok(frames.len())
    }

    /// Pauses (`true`) or resumes (`false`) playback.
    pub async fn cork(&self, stream: &PlaybackStream, cork: bool) -> Result<(), ClientError> {
        let channel = stream.channel;
        self.command(|tag| command::cork_playback_stream(tag, channel, cork))
            .await
            .map(drop)
    }

    /// Waits until everything written so far has been played.
    pub async fn drain(&self, stream: &PlaybackStream) -> Result<(), ClientError> {
        let channel = stream.channel;
        self.command(|tag| command::drain_playback_stream(tag, channel))
            .await
            .map(drop)
    }

    pub async fn delete_playback_stream(&self, stream: PlaybackStream) -> Result<(), ClientError> {
        let channel = stream.channel;
        self.command(|tag| command::delete_playback_stream(tag, channel))
            .await?;
        debug!(channel, "playback stream deleted");
        Ok(())
    }

    /// Asks for change notifications on the facilities in `mask`; see
    /// [`command::subscription`].
    pub async fn subscribe(&self, mask: u32) -> Result<(), ClientError> {
        self.command(|tag| command::subscribe(tag, mask))
            .await
            .map(drop)
    }

    // ── Events and lifecycle ──────────────────────────────────────────────────

    /// Hands reading to a background task; notifications and unclaimed
    /// replies arrive on the returned queue.
    pub async fn start_event_pump(
        &self,
        capacity: usize,
    ) -> Result<EventConsumer<AudioFrame>, ClientError> {
        self.engine.start_pump(capacity).await
    }

    /// Callback for notifications read while waiting for replies before the
    /// pump is started.  Server sample data read in that window is dropped.
    pub fn set_notification_hook(&self, mut hook: impl FnMut(Notification) + Send + 'static) {
        self.engine.set_drain_hook(move |frame| match notification_of(&frame) {
            Some(Ok(n)) => hook(n),
            Some(Err(e)) => warn!(error = %e, "undecodable notification"),
            None => {}
        });
    }

    pub fn is_closed(&self) -> bool {
        self.engine.is_closed()
    }

    /// Stops the pump and closes the socket.  Idempotent.
    pub async fn close(&self) {
        self.engine.close().await;
    }
}
