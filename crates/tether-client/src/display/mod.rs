//! Display connections.
//!
//! A [`DisplayConnection`] performs the setup handshake, probes for the
//! shared-memory image extension, and then offers typed requests on top of
//! the engine.  Requests with no reply are written without waiting; use
//! [`DisplayConnection::send_checked`] or [`DisplayConnection::sync`] to learn
//! whether they succeeded.

pub mod protocol;
pub mod zero_copy;

use std::sync::Arc;

use tether_core::display::codec::ReplyFrame;
use tether_core::display::requests::{
    self, GcValues, InternAtomReply, PutImageHeader, QueryExtensionReply, WindowAttributes,
    WindowSpec, COPY_FROM_PARENT, IMAGE_FORMAT_Z_PIXMAP, WINDOW_CLASS_INPUT_OUTPUT,
};
use tether_core::display::setup::{self, Screen, SetupInfo, SetupOutcome, SETUP_HEADER_SIZE};
use tether_core::display::{chunking, shm, ImageLayout};
use tether_core::{DecodeError, ResourceId, ResourceIdAllocator, ServerFrame, XauthEntry};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::{debug, info, warn};

use crate::config::DisplayConfig;
use crate::engine::{Engine, EventConsumer};
use crate::error::ClientError;
use crate::infrastructure::{address, credential_store};

pub use protocol::DisplayProtocol;
pub use zero_copy::{
    CopyUploader, FallbackUploader, ImageUploader, SharedSegment, ShmCapability, ShmUploader,
    UploadPath,
};

/// Connection options that do not come from the socket address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayOptions {
    /// Screen whose root window new windows are created on.
    pub screen: u32,
    pub use_shared_memory: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            screen: 0,
            use_shared_memory: true,
        }
    }
}

/// Where and how an image is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageTarget {
    pub drawable: ResourceId,
    pub gc: ResourceId,
    pub depth: u8,
    pub dst_x: i16,
    pub dst_y: i16,
}

/// An open display session.
pub struct DisplayConnection {
    engine: Engine<DisplayProtocol>,
    setup: SetupInfo,
    ids: ResourceIdAllocator,
    screen: usize,
    shm: Option<ShmCapability>,
}

fn into_reply(frame: ServerFrame) -> Result<ReplyFrame, ClientError> {
    match frame {
        ServerFrame::Reply(r) => Ok(r),
        ServerFrame::Error(e) => Err(protocol::server_error(&e)),
        ServerFrame::Event(_) => Err(ClientError::Decode(DecodeError::Malformed(
            "event where a reply was expected".into(),
        ))),
    }
}

impl DisplayConnection {
    /// Resolves the display from `config` and the environment, finds a
    /// credential, connects, and completes the handshake.
    pub async fn connect(config: &DisplayConfig) -> Result<Self, ClientError> {
        let name = address::display_name(config.name.as_deref(), address::process_env)?;
        let addr = address::parse_display_name(&name, &config.socket_dir)?;
        let credential =
            credential_store::xauthority_path(config.xauthority.as_deref(), address::process_env)
                .and_then(|path| {
                    credential_store::load_display_credential(
                        &path,
                        addr.display,
                        &credential_store::local_hostname(),
                    )
                });
        debug!(
            display = %name,
            socket = %addr.socket.display(),
            has_credential = credential.is_some(),
            "connecting"
        );
        let stream = UnixStream::connect(&addr.socket).await?;
        let options = DisplayOptions {
            screen: addr.screen,
            use_shared_memory: config.use_shared_memory,
        };
        Self::handshake(stream, credential.as_ref(), options).await
    }

    /// Runs the setup exchange on an already connected socket.
    ///
    /// On any failure the socket is dropped; no partially set-up connection
    /// escapes.
    pub async fn handshake(
        mut stream: UnixStream,
        credential: Option<&XauthEntry>,
        options: DisplayOptions,
    ) -> Result<Self, ClientError> {
        let (auth_name, auth_data) = match credential {
            Some(c) => (c.name.as_bytes(), c.data.as_slice()),
            None => (&b""[..], &b""[..]),
        };
        stream
            .write_all(&setup::encode_preamble(auth_name, auth_data))
            .await?;

        let mut header = [0u8; SETUP_HEADER_SIZE];
        stream.read_exact(&mut header).await?;
        let mut body = vec![0u8; setup::body_len(&header)];
        stream.read_exact(&mut body).await?;

        let setup = match setup::parse_reply(&header, &body)? {
            SetupOutcome::Success(info) => info,
            SetupOutcome::Failed(f) => {
                return Err(ClientError::ProtocolRejected {
                    reason: format!(
                        "{} (server protocol {}.{})",
                        f.reason, f.protocol_major, f.protocol_minor
                    ),
                })
            }
            SetupOutcome::Authenticate(reason) => return Err(ClientError::AuthRequired { reason }),
        };
        let ids = ResourceIdAllocator::new(setup.resource_id_base, setup.resource_id_mask)?;
        let screen = options.screen as usize;
        if screen >= setup.screens.len() {
            return Err(ClientError::AddressResolution {
                address: format!("screen {screen}"),
                reason: format!("server has {} screen(s)", setup.screens.len()),
            });
        }
        info!(
            vendor = %setup.vendor,
            release = setup.release_number,
            screens = setup.screens.len(),
            max_request_bytes = setup.max_request_bytes(),
            "display setup complete"
        );

        let mut conn = Self {
            engine: Engine::new(stream, 1),
            setup,
            ids,
            screen,
            shm: None,
        };
        if options.use_shared_memory {
            conn.shm = conn.probe_shared_memory().await?;
        }
        Ok(conn)
    }

    async fn probe_shared_memory(&self) -> Result<Option<ShmCapability>, ClientError> {
        let ext = self.query_extension(shm::EXTENSION_NAME).await?;
        if !ext.present {
            debug!("shared-memory extension not offered");
            return Ok(None);
        }
        let reply = match self
            .request_reply(shm::query_version(ext.major_opcode)?)
            .await
        {
            Ok(reply) => reply,
            Err(e @ ClientError::Server { .. }) => {
                warn!(error = %e, "shared-memory version query failed, using socket uploads");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let version = shm::QueryVersionReply::decode(&reply)?;
        let cap = ShmCapability {
            major_opcode: ext.major_opcode,
            first_event: ext.first_event,
            version: (version.major_version, version.minor_version),
            shared_pixmaps: version.shared_pixmaps,
        };
        info!(
            major_opcode = cap.major_opcode,
            version = ?cap.version,
            "shared-memory images available"
        );
        Ok(Some(cap))
    }

    // ── Session state ─────────────────────────────────────────────────────────

    pub fn setup(&self) -> &SetupInfo {
        &self.setup
    }

    /// The screen selected by the display name.
    pub fn screen(&self) -> &Screen {
        &self.setup.screens[self.screen]
    }

    pub fn shm_capability(&self) -> Option<ShmCapability> {
        self.shm
    }

    /// Allocates an id for a new server object.
    pub fn generate_id(&self) -> Result<ResourceId, ClientError> {
        Ok(self.ids.generate()?)
    }

    // ── Request plumbing ──────────────────────────────────────────────────────

    /// Writes a request that has no reply, without waiting for the server.
    pub async fn send(&self, request: &[u8]) -> Result<(), ClientError> {
        self.engine.send(request).await.map(drop)
    }

    /// Writes a request that has no reply and waits until the server has
    /// processed it, returning its error if it failed.
    pub async fn send_checked(&self, request: Vec<u8>) -> Result<(), ClientError> {
        let barrier = requests::get_input_focus()?;
        let frames = self
            .engine
            .round_trip_batch(move |_| Ok(vec![request, barrier]))
            .await?;
        for frame in frames {
            if let ServerFrame::Error(e) = frame {
                return Err(protocol::server_error(&e));
            }
        }
        Ok(())
    }

    /// Waits until the server has processed every request written so far.
    pub async fn sync(&self) -> Result<(), ClientError> {
        self.request_reply(requests::get_input_focus()?)
            .await
            .map(drop)
    }

    async fn request_reply(&self, request: Vec<u8>) -> Result<ReplyFrame, ClientError> {
        let frame = self.engine.round_trip(move |_| Ok(request)).await?;
        into_reply(frame)
    }

    // ── Typed requests ────────────────────────────────────────────────────────

    /// Creates an input-output child of the root window with the root's
    /// depth and visual.
    pub async fn create_window(
        &self,
        x: i16,
        y: i16,
        width: u16,
        height: u16,
        attrs: &WindowAttributes,
    ) -> Result<ResourceId, ClientError> {
        let window = self.generate_id()?;
        let spec = WindowSpec {
            depth: COPY_FROM_PARENT as u8,
            window,
            parent: self.screen().root,
            x,
            y,
            width,
            height,
            border_width: 0,
            class: WINDOW_CLASS_INPUT_OUTPUT,
            visual: COPY_FROM_PARENT,
        };
        self.send(&requests::create_window(&spec, attrs)?).await?;
        debug!(window, width, height, "window created");
        Ok(window)
    }

    pub async fn map_window(&self, window: ResourceId) -> Result<(), ClientError> {
        self.send(&requests::map_window(window)?).await
    }

    pub async fn unmap_window(&self, window: ResourceId) -> Result<(), ClientError> {
        self.send(&requests::unmap_window(window)?).await
    }

    pub async fn destroy_window(&self, window: ResourceId) -> Result<(), ClientError> {
        self.send(&requests::destroy_window(window)?).await
    }

    pub async fn create_gc(
        &self,
        drawable: ResourceId,
        values: &GcValues,
    ) -> Result<ResourceId, ClientError> {
        let gc = self.generate_id()?;
        self.send(&requests::create_gc(gc, drawable, values)?).await?;
        Ok(gc)
    }

    pub async fn free_gc(&self, gc: ResourceId) -> Result<(), ClientError> {
        self.send(&requests::free_gc(gc)?).await
    }

    /// Returns the atom for `name`.  With `only_if_exists`, an unknown name
    /// yields atom 0 rather than creating it.
    pub async fn intern_atom(&self, name: &str, only_if_exists: bool) -> Result<u32, ClientError> {
        let reply = self
            .request_reply(requests::intern_atom(only_if_exists, name)?)
            .await?;
        Ok(InternAtomReply::decode(&reply)?.atom)
    }

    pub async fn query_extension(&self, name: &str) -> Result<QueryExtensionReply, ClientError> {
        let reply = self.request_reply(requests::query_extension(name)?).await?;
        Ok(QueryExtensionReply::decode(&reply)?)
    }

    /// Uploads `data` through the socket, split into as many PutImage
    /// requests as the server's request limit demands.  The requests are
    /// written back to back.  Returns how many were written.
    pub async fn put_image(
        &self,
        target: &ImageTarget,
        layout: &ImageLayout,
        data: &[u8],
    ) -> Result<usize, ClientError> {
        let header = PutImageHeader {
            format: IMAGE_FORMAT_Z_PIXMAP,
            drawable: target.drawable,
            gc: target.gc,
            width: layout.width,
            height: layout.height,
            dst_x: target.dst_x,
            dst_y: target.dst_y,
            left_pad: 0,
            depth: target.depth,
        };
        let frames =
            chunking::encode_put_image(&header, layout, data, self.setup.max_request_bytes())?;
        self.engine.send_batch(&frames).await?;
        debug!(requests = frames.len(), bytes = layout.byte_len(), "image uploaded over socket");
        Ok(frames.len())
    }

    // ── Events and lifecycle ──────────────────────────────────────────────────

    /// Hands reading to a background task; events, asynchronous errors, and
    /// unclaimed replies arrive on the returned queue.
    pub async fn start_event_pump(
        &self,
        capacity: usize,
    ) -> Result<EventConsumer<ServerFrame>, ClientError> {
        self.engine.start_pump(capacity).await
    }

    /// Callback for events read while waiting for replies before the pump
    /// is started.
    pub fn set_event_hook(&self, hook: impl FnMut(ServerFrame) + Send + 'static) {
        self.engine.set_drain_hook(hook);
    }

    pub fn is_closed(&self) -> bool {
        self.engine.is_closed()
    }

    /// Stops the pump and closes the socket.  Shared-memory segments still
    /// held by the caller release their local side when dropped.  Idempotent.
    pub async fn close(&self) {
        self.engine.close().await;
    }

    /// Upload strategy for this connection: shared memory with a socket
    /// fallback when the extension is available, the socket otherwise.
    pub fn uploader(self: &Arc<Self>) -> Box<dyn ImageUploader> {
        let copy = CopyUploader::new(Arc::clone(self));
        if self.shm.is_some() {
            Box::new(FallbackUploader::new(ShmUploader::new(Arc::clone(self)), copy))
        } else {
            Box::new(copy)
        }
    }
}
