//! The write side of a connection.
//!
//! The request counter lives under the same lock as the socket so that the
//! order of numbers handed out is the order of bytes on the wire.

use tokio::io::AsyncWriteExt;
use tokio::net::unix::OwnedWriteHalf;
use tokio::sync::Mutex;
use tracing::trace;

use crate::error::ClientError;

struct WriteState {
    half: Option<OwnedWriteHalf>,
    next: u64,
}

pub(crate) struct Outbound {
    state: Mutex<WriteState>,
}

/// Exclusive access to the writer for one batch of requests.
pub(crate) struct OutboundGuard<'a> {
    state: tokio::sync::MutexGuard<'a, WriteState>,
}

impl Outbound {
    /// `first` is the number the first request written will carry.
    pub(crate) fn new(half: OwnedWriteHalf, first: u64) -> Self {
        Self {
            state: Mutex::new(WriteState {
                half: Some(half),
                next: first,
            }),
        }
    }

    pub(crate) async fn lock(&self) -> OutboundGuard<'_> {
        OutboundGuard {
            state: self.state.lock().await,
        }
    }

    /// Shuts the socket down for writing.  Later writes fail with
    /// [`ClientError::Closed`].
    pub(crate) async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if let Some(mut half) = state.half.take() {
            if let Err(e) = half.shutdown().await {
                trace!(error = %e, "socket shutdown reported an error");
            }
        }
    }
}

impl OutboundGuard<'_> {
    /// Number the next request will carry.
    pub(crate) fn next_number(&self) -> u64 {
        self.state.next
    }

    /// Writes one request and advances the counter.
    pub(crate) async fn write_request(&mut self, bytes: &[u8]) -> Result<u64, ClientError> {
        let number = self.state.next;
        self.write_raw(bytes).await?;
        self.state.next += 1;
        Ok(number)
    }

    /// Writes bytes that do not count as a request.
    pub(crate) async fn write_raw(&mut self, bytes: &[u8]) -> Result<(), ClientError> {
        let half = self.state.half.as_mut().ok_or(ClientError::Closed)?;
        half.write_all(bytes).await?;
        Ok(())
    }

    pub(crate) async fn flush(&mut self) -> Result<(), ClientError> {
        let half = self.state.half.as_mut().ok_or(ClientError::Closed)?;
        half.flush().await?;
        Ok(())
    }
}
