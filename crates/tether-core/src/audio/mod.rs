//! The tagged audio protocol.
//!
//! Big-endian throughout.  Each frame is a 20-byte [`descriptor`] followed
//! either by a control packet of [`tagstruct`] values or by raw samples for a
//! stream.  [`command`] knows the argument lists of the requests this client
//! sends and the notifications it understands.

pub mod command;
pub mod descriptor;
pub mod tagstruct;

pub use command::{Command, ErrorCode, Notification};
pub use descriptor::{AudioFrame, Descriptor, Memblock, Packet};
pub use tagstruct::{SampleFormat, SampleSpec};
