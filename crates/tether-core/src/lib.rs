//! # tether-core
//!
//! Wire codecs and session primitives for two local-socket protocols: a
//! windowing/display protocol and an audio-server protocol.
//!
//! This crate has zero dependencies on sockets, runtimes, or OS calls.  It
//! turns typed requests into exact byte sequences and exact byte sequences
//! back into typed frames.  The socket engine lives in `tether-client`.
//!
//! # Architecture overview
//!
//! - **`display`** – The positional protocol.  Every request is an opcode
//!   byte followed by fixed-width fields at documented offsets, padded to a
//!   4-byte boundary, little-endian.  Server traffic is a 32-byte frame
//!   (optionally extended for replies) whose first byte tells error, reply,
//!   and event apart.
//!
//! - **`audio`** – The tagged protocol.  Every frame starts with a 20-byte
//!   big-endian descriptor.  Control frames carry a sequence of
//!   self-describing values, each prefixed with a one-byte type tag.
//!
//! - **`auth`** – Parsers for the two credential formats: the length-prefixed
//!   record file of the display protocol and the flat 256-byte cookie of the
//!   audio protocol.
//!
//! - **`resource_id`** – The client-side id allocator for server-held
//!   display objects.

pub mod audio;
pub mod auth;
pub mod display;
pub mod error;
pub mod resource_id;

pub use audio::tagstruct::{TagStructReader, TagStructWriter, TagValue};
pub use auth::{AuthError, Cookie, XauthEntry};
pub use display::codec::ServerFrame;
pub use error::{DecodeError, EncodeError};
pub use resource_id::{IdError, ResourceId, ResourceIdAllocator};
