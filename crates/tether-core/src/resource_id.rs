//! Thread-safe allocator for client-generated resource ids.
//!
//! # How display resource ids work
//!
//! The display server hands every client a `base` and a `mask` during the
//! connection handshake.  Every window, graphics context, or shared-memory
//! segment the client creates must be named by an id of the form
//! `(counter & mask) | base`.  The bits outside `mask` identify the client
//! and are owned by the server; the bits inside `mask` belong to the client.
//!
//! # Why ids are never recycled
//!
//! The counter only moves forward, even after the object named by an id has
//! been destroyed.  A late event or error still carrying the old id would
//! otherwise be attributed to whatever new object happened to reuse it.
//! Running out of ids is a hard error rather than a silent wrap for the same
//! reason: wrapping would start handing out ids that may still be live.
//!
//! # Thread safety
//!
//! The counter is an `AtomicU32`, so two threads calling [`generate`] at the
//! same moment each receive a distinct value without taking a lock.
//!
//! [`generate`]: ResourceIdAllocator::generate

use std::sync::atomic::{AtomicU32, Ordering};

use thiserror::Error;

/// A client-allocated 32-bit handle referencing a server-held object.
pub type ResourceId = u32;

/// Errors returned by [`ResourceIdAllocator`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    /// Every value of the masked counter has already been handed out.
    #[error("resource id space exhausted (mask {mask:#010x})")]
    Exhausted { mask: u32 },

    /// The server sent a base that overlaps its own mask.
    #[error("resource id base {base:#010x} overlaps mask {mask:#010x}")]
    OverlappingBase { base: u32, mask: u32 },

    /// The server sent an empty mask, so no client id can exist.
    #[error("resource id mask is empty")]
    EmptyMask,
}

/// Monotonic, never-reclaiming id allocator.
///
/// # Examples
///
/// ```rust
/// use tether_core::ResourceIdAllocator;
///
/// let ids = ResourceIdAllocator::new(0x0040_0000, 0x001F_FFFF).unwrap();
/// let a = ids.generate().unwrap();
/// let b = ids.generate().unwrap();
/// assert_ne!(a, b);
/// assert_eq!(a & !0x001F_FFFF, 0x0040_0000);
/// ```
#[derive(Debug)]
pub struct ResourceIdAllocator {
    base: u32,
    mask: u32,
    /// The next raw counter value.  Starts at 1 so the bare base is never
    /// handed out.
    counter: AtomicU32,
}

impl ResourceIdAllocator {
    /// Creates an allocator from the base and mask negotiated at handshake.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::EmptyMask`] for a zero mask and
    /// [`IdError::OverlappingBase`] when `base & mask != 0`.
    pub fn new(base: u32, mask: u32) -> Result<Self, IdError> {
        if mask == 0 {
            return Err(IdError::EmptyMask);
        }
        if base & mask != 0 {
            return Err(IdError::OverlappingBase { base, mask });
        }
        Ok(Self {
            base,
            mask,
            counter: AtomicU32::new(1),
        })
    }

    /// Returns the next id, computed as `(counter & mask) | base`.
    ///
    /// The counter advances on every successful call.  Once it steps outside
    /// `mask` it stops there, so an exhausted allocator stays exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::Exhausted`] once the counter has bits outside
    /// `mask`, i.e. once every client id has been used.
    pub fn generate(&self) -> Result<ResourceId, IdError> {
        let mask = self.mask;
        // Zero only appears after the u32 itself wrapped (full mask).
        let exhausted = |raw: u32| raw == 0 || raw & !mask != 0;
        let raw = self
            .counter
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |raw| {
                if exhausted(raw) {
                    None
                } else {
                    Some(raw.wrapping_add(1))
                }
            })
            .map_err(|_| IdError::Exhausted { mask })?;
        Ok((raw & mask) | self.base)
    }

    /// The server-owned bits of every id this allocator produces.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// The client-owned bits.
    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// Returns `true` if `id` lies in this client's id space.
    pub fn owns(&self, id: ResourceId) -> bool {
        id & !self.mask == self.base
    }
}
