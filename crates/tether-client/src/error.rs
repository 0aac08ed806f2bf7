//! Error taxonomy for connections built on the engine.

use tether_core::{DecodeError, EncodeError, IdError};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur on a display or audio connection.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server address could not be turned into a local socket path.
    #[error("cannot resolve server address {address:?}: {reason}")]
    AddressResolution { address: String, reason: String },

    /// Socket I/O failed.  Fatal to the connection.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The server refused the connection during the handshake.
    #[error("server rejected the connection: {reason}")]
    ProtocolRejected { reason: String },

    /// The server wants a credential this client did not have or that it
    /// did not accept.
    #[error("server requires authentication: {reason}")]
    AuthRequired { reason: String },

    /// A frame could not be decoded.  Only the operation that read it fails.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A request could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// The server answered one request with an error.
    #[error("server error {code} ({description}) for request {request}")]
    Server {
        code: u32,
        description: String,
        request: u32,
    },

    /// An optional extension was used without having been negotiated.
    #[error("{0} is not available on this connection")]
    CapabilityUnavailable(&'static str),

    /// The client-side id space is used up.
    #[error(transparent)]
    ResourceIds(#[from] IdError),

    /// An OS shared-memory call failed.
    #[error("shared memory: {0}")]
    SharedMemory(#[source] std::io::Error),

    /// The server refused to register a shared-memory segment.  Wraps the
    /// server's error for the attach.
    #[error("server refused the shared-memory segment: {0}")]
    SegmentRejected(#[source] Box<ClientError>),

    /// `start_pump` was called while a pump already owns the reads.
    #[error("event pump is already running")]
    PumpRunning,

    /// The event pump stopped; it will not deliver further replies.
    #[error("event pump has ended")]
    PumpEnded,

    /// The connection was closed locally or by the server.
    #[error("connection closed")]
    Closed,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// True for errors after which the connection cannot be used again.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(_)
                | ClientError::ProtocolRejected { .. }
                | ClientError::AuthRequired { .. }
                | ClientError::PumpEnded
                | ClientError::Closed
        )
    }
}
