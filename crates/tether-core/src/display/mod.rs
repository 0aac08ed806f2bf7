//! The positional display protocol.
//!
//! Wire conventions (client byte order is declared little-endian in the
//! connection preamble):
//!
//! ```text
//! request: [opcode:1][data:1][length_in_words:2][fields...][pad to 4]
//! server:  [kind:1][detail:1][sequence:2][...28 bytes...][reply extension]
//! ```
//!
//! Server frames are always at least 32 bytes.  Replies (kind 1) and generic
//! events (kind 35) declare `4 * length` additional bytes at offset 4.

pub mod chunking;
pub mod codec;
pub mod events;
pub mod requests;
pub mod setup;
pub mod shm;

pub use chunking::{plan_put_image, ImageChunk, ImageLayout};
pub use codec::{ErrorFrame, ReplyFrame, RequestBuilder, ServerFrame, WireReader};
pub use events::Event;
pub use setup::{SetupFailure, SetupInfo, SetupOutcome};
