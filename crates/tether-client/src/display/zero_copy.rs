//! Image upload strategies, including the shared-memory path.
//!
//! # Segment lifecycle
//!
//! 1. [`DisplayConnection::create_segment`] creates and maps an OS segment,
//!    then registers it with the server (`Attach`), checked.
//! 2. Pixels are written into [`SharedSegment::bytes_mut`] and shown with
//!    [`DisplayConnection::put_shared`], which returns once the server has
//!    read them.
//! 3. [`DisplayConnection::destroy_segment`] unregisters the segment from
//!    the server, unmaps it, and removes it.  Each step runs once even if
//!    teardown is repeated or an earlier step failed.
//!
//! A segment dropped without teardown still releases its local side; the
//! server forgets it when the connection closes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tether_core::display::requests::IMAGE_FORMAT_Z_PIXMAP;
use tether_core::display::shm::{self, ShmPutImage};
use tether_core::display::ImageLayout;
use tether_core::{EncodeError, ResourceId};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{DisplayConnection, ImageTarget};
use crate::error::ClientError;
use crate::infrastructure::shm_segment::ShmMapping;

const SHM: &str = "MIT-SHM";

/// What the capability probe learned about the shared-memory extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShmCapability {
    pub major_opcode: u8,
    /// Event code of the completion event.
    pub first_event: u8,
    pub version: (u16, u16),
    pub shared_pixmaps: bool,
}

/// An OS segment registered with the server.
#[derive(Debug)]
pub struct SharedSegment {
    shmseg: ResourceId,
    mapping: ShmMapping,
    attached: bool,
}

impl SharedSegment {
    /// Server-side id of the segment.
    pub fn id(&self) -> ResourceId {
        self.shmseg
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// True once every teardown step has run.
    pub fn is_released(&self) -> bool {
        !self.attached && !self.mapping.is_mapped() && self.mapping.is_removed()
    }

    /// The segment's memory.
    ///
    /// # Errors
    ///
    /// [`ClientError::CapabilityUnavailable`] after teardown unmapped it.
    pub fn bytes_mut(&mut self) -> Result<&mut [u8], ClientError> {
        self.mapping
            .bytes_mut()
            .ok_or(ClientError::CapabilityUnavailable("released shared-memory segment"))
    }

    /// Copies `data` into the segment at `offset`.
    pub fn write_at(&mut self, offset: usize, data: &[u8]) -> Result<(), ClientError> {
        let len = self.len();
        let dst = self.bytes_mut()?;
        let end = offset
            .checked_add(data.len())
            .filter(|&end| end <= len)
            .ok_or(ClientError::Encode(EncodeError::FieldOutOfRange {
                field: "segment write end",
                value: offset as u64 + data.len() as u64,
            }))?;
        dst[offset..end].copy_from_slice(data);
        Ok(())
    }
}

impl DisplayConnection {
    fn require_shm(&self) -> Result<ShmCapability, ClientError> {
        self.shm.ok_or(ClientError::CapabilityUnavailable(SHM))
    }

    /// Creates a segment of `len` bytes and attaches it to the server.
    ///
    /// # Errors
    ///
    /// [`ClientError::CapabilityUnavailable`] if the extension was not
    /// negotiated, [`ClientError::SharedMemory`] if the OS refuses, or the
    /// server's error for the attach.  Nothing is left allocated on failure.
    pub async fn create_segment(&self, len: usize) -> Result<SharedSegment, ClientError> {
        let cap = self.require_shm()?;
        let mapping = ShmMapping::create(len).map_err(ClientError::SharedMemory)?;
        let shmseg = self.generate_id()?;
        self.send_checked(shm::attach(
            cap.major_opcode,
            shmseg,
            mapping.id() as u32,
            false,
        )?)
        .await?;
        debug!(shmseg, shmid = mapping.id(), len, "segment attached");
        Ok(SharedSegment {
            shmseg,
            mapping,
            attached: true,
        })
    }

    /// Draws the image stored at `offset` in `segment` and waits until the
    /// server has read it.
    pub async fn put_shared(
        &self,
        segment: &SharedSegment,
        target: &ImageTarget,
        layout: &ImageLayout,
        offset: u32,
    ) -> Result<(), ClientError> {
        let cap = self.require_shm()?;
        if !segment.attached {
            return Err(ClientError::CapabilityUnavailable("released shared-memory segment"));
        }
        let end = offset as usize + layout.byte_len();
        if end > segment.len() {
            return Err(ClientError::Encode(EncodeError::FieldOutOfRange {
                field: "segment image end",
                value: end as u64,
            }));
        }
        let request = shm::put_image(
            cap.major_opcode,
            &ShmPutImage {
                drawable: target.drawable,
                gc: target.gc,
                total_width: layout.width,
                total_height: layout.height,
                src_x: 0,
                src_y: 0,
                src_width: layout.width,
                src_height: layout.height,
                dst_x: target.dst_x,
                dst_y: target.dst_y,
                depth: target.depth,
                format: IMAGE_FORMAT_Z_PIXMAP,
                send_event: false,
                shmseg: segment.shmseg,
                offset,
            },
        )?;
        self.send_checked(request).await
    }

    /// Runs all three teardown steps: unregister from the server, unmap,
    /// remove.  A step that already ran is skipped; a failing step does not
    /// stop the later ones.  Returns the first error.
    pub async fn destroy_segment(&self, segment: &mut SharedSegment) -> Result<(), ClientError> {
        let mut first_error = None;

        if segment.attached {
            segment.attached = false;
            match self.shm {
                Some(cap) if !self.is_closed() => {
                    let sent = match shm::detach(cap.major_opcode, segment.shmseg) {
                        Ok(request) => self.send(&request).await,
                        Err(e) => Err(e.into()),
                    };
                    if let Err(e) = sent {
                        warn!(shmseg = segment.shmseg, error = %e, "detach request failed");
                        first_error.get_or_insert(e);
                    }
                }
                _ => debug!(
                    shmseg = segment.shmseg,
                    "connection gone, server already released segment"
                ),
            }
        }
        if let Err(e) = segment.mapping.detach() {
            warn!(shmseg = segment.shmseg, error = %e, "shmdt failed");
            first_error.get_or_insert(ClientError::SharedMemory(e));
        }
        if let Err(e) = segment.mapping.remove() {
            warn!(shmseg = segment.shmseg, error = %e, "IPC_RMID failed");
            first_error.get_or_insert(ClientError::SharedMemory(e));
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ── Upload strategies ─────────────────────────────────────────────────────────

/// Which path an upload took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPath {
    /// Sent through the socket in this many requests.
    Copied { requests: usize },
    Shared,
}

/// Something that can put a packed image on a drawable.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageUploader: Send + Sync {
    async fn upload(
        &self,
        target: &ImageTarget,
        layout: &ImageLayout,
        data: &[u8],
    ) -> Result<UploadPath, ClientError>;
}

/// Uploads through the socket in chunked PutImage requests.
pub struct CopyUploader {
    conn: Arc<DisplayConnection>,
}

impl CopyUploader {
    pub fn new(conn: Arc<DisplayConnection>) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl ImageUploader for CopyUploader {
    async fn upload(
        &self,
        target: &ImageTarget,
        layout: &ImageLayout,
        data: &[u8],
    ) -> Result<UploadPath, ClientError> {
        let requests = self.conn.put_image(target, layout, data).await?;
        Ok(UploadPath::Copied { requests })
    }
}

/// Uploads through one reusable shared segment, grown on demand.
pub struct ShmUploader {
    conn: Arc<DisplayConnection>,
    segment: Mutex<Option<SharedSegment>>,
}

impl ShmUploader {
    pub fn new(conn: Arc<DisplayConnection>) -> Self {
        Self {
            conn,
            segment: Mutex::new(None),
        }
    }

    /// Tears down the current segment, if any.
    pub async fn release(&self) -> Result<(), ClientError> {
        match self.segment.lock().await.take() {
            Some(mut seg) => self.conn.destroy_segment(&mut seg).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ImageUploader for ShmUploader {
    async fn upload(
        &self,
        target: &ImageTarget,
        layout: &ImageLayout,
        data: &[u8],
    ) -> Result<UploadPath, ClientError> {
        let needed = layout.byte_len();
        let pixels = data.get(..needed).ok_or(ClientError::Encode(EncodeError::FieldOutOfRange {
            field: "image buffer length",
            value: data.len() as u64,
        }))?;

        let mut slot = self.segment.lock().await;
        let segment = match slot.take() {
            Some(seg) if seg.len() >= needed => seg,
            stale => {
                if let Some(mut old) = stale {
                    if let Err(e) = self.conn.destroy_segment(&mut old).await {
                        warn!(error = %e, "releasing undersized segment failed");
                    }
                }
                self.conn
                    .create_segment(needed)
                    .await
                    .map_err(|e| match e {
                        ClientError::Server { .. } => ClientError::SegmentRejected(Box::new(e)),
                        other => other,
                    })?
            }
        };
        let segment = slot.insert(segment);
        segment.write_at(0, pixels)?;
        self.conn.put_shared(segment, target, layout, 0).await?;
        Ok(UploadPath::Shared)
    }
}

/// Tries `primary`; when it reports that its mechanism is unusable,
/// switches to `fallback` for this and every later upload.
///
/// Unusable means the extension is missing, the OS refused the segment, or
/// the server refused to attach it.  Errors from drawing itself, such as a
/// bad drawable, are returned as they are.
pub struct FallbackUploader<P, F> {
    primary: P,
    fallback: F,
    primary_disabled: AtomicBool,
}

impl<P, F> FallbackUploader<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self {
            primary,
            fallback,
            primary_disabled: AtomicBool::new(false),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.primary_disabled.load(Ordering::Relaxed)
    }
}

fn mechanism_failed(e: &ClientError) -> bool {
    matches!(
        e,
        ClientError::CapabilityUnavailable(_)
            | ClientError::SharedMemory(_)
            | ClientError::SegmentRejected(_)
    )
}

#[async_trait]
impl<P: ImageUploader, F: ImageUploader> ImageUploader for FallbackUploader<P, F> {
    async fn upload(
        &self,
        target: &ImageTarget,
        layout: &ImageLayout,
        data: &[u8],
    ) -> Result<UploadPath, ClientError> {
        if !self.is_degraded() {
            match self.primary.upload(target, layout, data).await {
                Err(e) if mechanism_failed(&e) => {
                    warn!(error = %e, "primary upload path unusable, falling back");
                    self.primary_disabled.store(true, Ordering::Relaxed);
                }
                other => return other,
            }
        }
        self.fallback.upload(target, layout, data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::always;

    fn target() -> ImageTarget {
        ImageTarget {
            drawable: 1,
            gc: 2,
            depth: 24,
            dst_x: 0,
            dst_y: 0,
        }
    }

    #[tokio::test]
    async fn test_fallback_used_when_primary_unavailable() {
        // Arrange
        let mut primary = MockImageUploader::new();
        primary
            .expect_upload()
            .times(1)
            .returning(|_, _, _| Err(ClientError::CapabilityUnavailable("MIT-SHM")));
        let mut fallback = MockImageUploader::new();
        fallback
            .expect_upload()
            .with(always(), always(), always())
            .times(2)
            .returning(|_, _, _| Ok(UploadPath::Copied { requests: 1 }));
        let uploader = FallbackUploader::new(primary, fallback);
        let layout = ImageLayout::packed(2, 2, 4);

        // Act
        let first = uploader.upload(&target(), &layout, &[0; 16]).await.unwrap();
        let second = uploader.upload(&target(), &layout, &[0; 16]).await.unwrap();

        // Assert – the primary is not retried after it failed once
        assert_eq!(first, UploadPath::Copied { requests: 1 });
        assert_eq!(second, UploadPath::Copied { requests: 1 });
        assert!(uploader.is_degraded());
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let mut primary = MockImageUploader::new();
        primary
            .expect_upload()
            .returning(|_, _, _| Ok(UploadPath::Shared));
        let mut fallback = MockImageUploader::new();
        fallback.expect_upload().never();
        let uploader = FallbackUploader::new(primary, fallback);

        let path = uploader
            .upload(&target(), &ImageLayout::packed(1, 1, 4), &[0; 4])
            .await
            .unwrap();

        assert_eq!(path, UploadPath::Shared);
        assert!(!uploader.is_degraded());
    }

    #[tokio::test]
    async fn test_transport_errors_are_not_masked() {
        let mut primary = MockImageUploader::new();
        primary
            .expect_upload()
            .returning(|_, _, _| Err(ClientError::Closed));
        let mut fallback = MockImageUploader::new();
        fallback.expect_upload().never();
        let uploader = FallbackUploader::new(primary, fallback);

        let result = uploader
            .upload(&target(), &ImageLayout::packed(1, 1, 4), &[0; 4])
            .await;

        assert!(matches!(result, Err(ClientError::Closed)));
    }

    #[tokio::test]
    async fn test_draw_error_is_returned_without_degrading() {
        // Arrange – the segment exists but the server rejects the drawable
        let mut primary = MockImageUploader::new();
        primary.expect_upload().times(2).returning(|_, _, _| {
            Err(ClientError::Server {
                code: 9,
                description: "Drawable".into(),
                request: 12,
            })
        });
        let mut fallback = MockImageUploader::new();
        fallback.expect_upload().never();
        let uploader = FallbackUploader::new(primary, fallback);
        let layout = ImageLayout::packed(1, 1, 4);

        // Act
        let first = uploader.upload(&target(), &layout, &[0; 4]).await;
        let second = uploader.upload(&target(), &layout, &[0; 4]).await;

        // Assert – the primary is still tried after a draw error
        assert!(matches!(first, Err(ClientError::Server { code: 9, .. })));
        assert!(matches!(second, Err(ClientError::Server { code: 9, .. })));
        assert!(!uploader.is_degraded());
    }

    #[tokio::test]
    async fn test_refused_segment_degrades_to_fallback() {
        // Arrange
        let mut primary = MockImageUploader::new();
        primary.expect_upload().times(1).returning(|_, _, _| {
            Err(ClientError::SegmentRejected(Box::new(ClientError::Server {
                code: 10,
                description: "Access".into(),
                request: 5,
            })))
        });
        let mut fallback = MockImageUploader::new();
        fallback
            .expect_upload()
            .times(1)
            .returning(|_, _, _| Ok(UploadPath::Copied { requests: 1 }));
        let uploader = FallbackUploader::new(primary, fallback);

        // Act
        let path = uploader
            .upload(&target(), &ImageLayout::packed(1, 1, 4), &[0; 4])
            .await
            .unwrap();

        // Assert
        assert_eq!(path, UploadPath::Copied { requests: 1 });
        assert!(uploader.is_degraded());
    }
}
