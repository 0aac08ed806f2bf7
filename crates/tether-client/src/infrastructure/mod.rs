//! OS-facing helpers: socket addresses, credential files, shared memory.

pub mod address;
pub mod credential_store;
pub mod shm_segment;
