//! SysV shared-memory segments.
//!
//! A mapping is created and attached in one step.  Its two OS-side release
//! steps (detach the mapping, mark the segment for removal) are tracked
//! separately so that each runs at most once, in any order, and `Drop`
//! finishes whatever is left.

use std::io;

use tracing::{debug, warn};

/// A private SysV segment mapped into this process.
pub struct ShmMapping {
    shmid: libc::c_int,
    len: usize,
    /// The attached memory; `None` once detached.
    view: Option<&'static mut [u8]>,
    removed: bool,
}

impl ShmMapping {
    /// Creates a private segment of `len` bytes and maps it read-write.
    ///
    /// # Errors
    ///
    /// The OS error from `shmget` or `shmat`.  A segment that was created
    /// but could not be mapped is removed before returning.
    pub fn create(len: usize) -> io::Result<Self> {
        if len == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty segment"));
        }
        // SAFETY: shmget only reads its scalar arguments.
        let shmid = unsafe { libc::shmget(libc::IPC_PRIVATE, len, libc::IPC_CREAT | 0o600) };
        if shmid < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: a null address lets the kernel choose where to map.
        let addr = unsafe { libc::shmat(shmid, std::ptr::null(), 0) };
        if addr as isize == -1 {
            let err = io::Error::last_os_error();
            // SAFETY: shmid was returned by shmget above; a null buffer is
            // permitted for IPC_RMID.
            unsafe { libc::shmctl(shmid, libc::IPC_RMID, std::ptr::null_mut()) };
            return Err(err);
        }
        // SAFETY: shmat mapped `len` writable bytes at `addr`.  The slice is
        // only reachable through this struct, and `detach` takes it away
        // before unmapping.
        let view = unsafe { std::slice::from_raw_parts_mut(addr.cast::<u8>(), len) };
        debug!(shmid, len, "shared memory segment mapped");
        Ok(Self {
            shmid,
            len,
            view: Some(view),
            removed: false,
        })
    }

    /// The OS identifier the server attaches by.
    pub fn id(&self) -> i32 {
        self.shmid
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_mapped(&self) -> bool {
        self.view.is_some()
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// The mapped bytes, or `None` after [`detach`](Self::detach).
    pub fn bytes(&self) -> Option<&[u8]> {
        self.view.as_deref()
    }

    pub fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        self.view.as_deref_mut()
    }

    /// Unmaps the segment from this process.  Does nothing the second time.
    pub fn detach(&mut self) -> io::Result<()> {
        let Some(view) = self.view.take() else {
            return Ok(());
        };
        // SAFETY: the pointer came from shmat and the only slice over it was
        // just taken out of `self`.
        let rc = unsafe { libc::shmdt(view.as_ptr().cast()) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Marks the segment for destruction once every process has detached.
    /// Does nothing the second time.
    pub fn remove(&mut self) -> io::Result<()> {
        if self.removed {
            return Ok(());
        }
        self.removed = true;
        // SAFETY: IPC_RMID ignores the buffer argument.
        let rc = unsafe { libc::shmctl(self.shmid, libc::IPC_RMID, std::ptr::null_mut()) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl std::fmt::Debug for ShmMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShmMapping")
            .field("shmid", &self.shmid)
            .field("len", &self.len)
            .field("mapped", &self.is_mapped())
            .field("removed", &self.removed)
            .finish()
    }
}

impl Drop for ShmMapping {
    fn drop(&mut self) {
        if let Err(e) = self.detach() {
            warn!(shmid = self.shmid, error = %e, "shmdt failed during drop");
        }
        if let Err(e) = self.remove() {
            warn!(shmid = self.shmid, error = %e, "IPC_RMID failed during drop");
        }
    }
}
