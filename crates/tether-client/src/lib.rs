//! tether-client library entry point.
//!
//! Opens Unix-socket sessions to a display server and an audio server and
//! speaks their wire protocols (encoded by `tether-core`) on top of one
//! shared connection engine.
//!
//! # How a session works (for beginners)
//!
//! 1. The server's socket path and the local credential are worked out from
//!    the configuration file and the usual environment variables.
//! 2. The client connects and runs the protocol's handshake.  The display
//!    server answers with a setup block (screens, id range, request size
//!    limit); the audio server answers with its protocol version.
//! 3. Requests are numbered as they are written.  A caller that needs an
//!    answer reads the socket until the answer with its number arrives;
//!    events read on the way are handed to a hook.
//! 4. Applications that want events continuously start the event pump: a
//!    background task that owns the reads and fills a bounded queue.
//!
//! On the display side, images can also travel through a shared-memory
//! segment instead of the socket when the server offers that extension.

/// The audio-server client.
pub mod audio;

/// TOML configuration.
pub mod config;

/// The display-server client.
pub mod display;

/// Protocol-agnostic framing, demultiplexing, and event pump.
pub mod engine;

pub mod error;

/// OS adapters: socket addresses, credential files, shared memory.
pub mod infrastructure;

pub use audio::{AudioConnection, PlaybackStream};
pub use config::ClientConfig;
pub use display::{DisplayConnection, DisplayOptions, ImageTarget};
pub use engine::{EventConsumer, PushOutcome};
pub use error::ClientError;
