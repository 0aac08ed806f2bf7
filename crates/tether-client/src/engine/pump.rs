//! Background reader.
//!
//! Once started, the pump owns the read half.  Each frame is routed to the
//! single registered waiter if its key belongs to that waiter's batch, and
//! to the event queue otherwise.  The cancellation token is checked between
//! reads; a read already in progress is allowed to finish.

use std::sync::{Arc, Mutex, PoisonError};

use futures_util::StreamExt;
use tokio::net::unix::OwnedReadHalf;
use tokio::sync::oneshot;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::protocol::{FrameClass, FrameCodec, WireProtocol};
use super::queue::EventProducer;
use crate::error::ClientError;

pub(crate) type Framed<P> = FramedRead<OwnedReadHalf, FrameCodec<P>>;
pub(crate) type ReplySender<P> =
    oneshot::Sender<Result<Vec<<P as WireProtocol>::Frame>, ClientError>>;

/// A caller blocked on the answers to one batch of requests.
pub(crate) struct Waiter<P: WireProtocol> {
    keys: Vec<P::Key>,
    collected: Vec<P::Frame>,
    tx: ReplySender<P>,
}

impl<P: WireProtocol> Waiter<P> {
    pub(crate) fn new(keys: Vec<P::Key>, tx: ReplySender<P>) -> Self {
        Self {
            keys,
            collected: Vec::new(),
            tx,
        }
    }

    fn last(&self) -> Option<P::Key> {
        self.keys.last().copied()
    }
}

struct SlotState<P: WireProtocol> {
    ended: bool,
    waiter: Option<Waiter<P>>,
}

/// Rendezvous between round-trip callers and the pump.
pub(crate) struct PumpSlot<P: WireProtocol> {
    state: Mutex<SlotState<P>>,
}

impl<P: WireProtocol> PumpSlot<P> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                ended: false,
                waiter: None,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SlotState<P>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Installs the waiter for the next batch.
    ///
    /// # Errors
    ///
    /// [`ClientError::PumpEnded`] if the pump has already stopped.
    pub(crate) fn register(&self, waiter: Waiter<P>) -> Result<(), ClientError> {
        let mut state = self.lock();
        if state.ended {
            return Err(ClientError::PumpEnded);
        }
        state.waiter = Some(waiter);
        Ok(())
    }

    /// Removes the waiter after its requests failed to go out.
    pub(crate) fn clear(&self) {
        self.lock().waiter = None;
    }

    /// Hands a keyed frame to the waiter.  Returns the frame if nobody
    /// claimed it.
    fn offer(&self, key: P::Key, frame: P::Frame) -> Option<P::Frame> {
        let mut state = self.lock();
        let Some(waiter) = state.waiter.as_mut() else {
            return Some(frame);
        };
        if !waiter.keys.contains(&key) {
            return Some(frame);
        }
        waiter.collected.push(frame);
        if waiter.last() == Some(key) {
            if let Some(done) = state.waiter.take() {
                // The caller may have given up; nothing to do then.
                let _ = done.tx.send(Ok(done.collected));
            }
        }
        None
    }

    /// Marks the pump as stopped and fails any waiter with `reason`.
    fn finish(&self, reason: ClientError) {
        let mut state = self.lock();
        state.ended = true;
        match state.waiter.take() {
            Some(waiter) => {
                let _ = waiter.tx.send(Err(reason));
            }
            None => debug!(protocol = P::NAME, %reason, "pump stopped with no waiter"),
        }
    }
}

/// Runs until cancelled, the stream ends, or a frame cannot be decoded.
pub(crate) async fn run<P: WireProtocol>(
    mut framed: Framed<P>,
    slot: Arc<PumpSlot<P>>,
    events: EventProducer<P::Frame>,
    cancel: CancellationToken,
) {
    info!(protocol = P::NAME, "event pump started");
    let reason = loop {
        if cancel.is_cancelled() {
            break ClientError::Closed;
        }
        let frame = match framed.next().await {
            Some(Ok(Ok(frame))) => frame,
            Some(Ok(Err(e))) => break ClientError::Decode(e),
            Some(Err(e)) => break e,
            None => break ClientError::Closed,
        };
        match P::classify(&frame) {
            FrameClass::Notification => {
                events.push(frame);
            }
            FrameClass::Reply(key) => {
                if let Some(orphan) = slot.offer(key, frame) {
                    warn!(protocol = P::NAME, ?key, "reply with no waiter, queued as event");
                    events.push(orphan);
                }
            }
            FrameClass::Error(key) => {
                if let Some(orphan) = slot.offer(key, frame) {
                    debug!(protocol = P::NAME, ?key, "asynchronous error queued as event");
                    events.push(orphan);
                }
            }
        }
    };
    match &reason {
        ClientError::Closed => info!(protocol = P::NAME, "event pump stopped"),
        other => error!(protocol = P::NAME, error = %other, "event pump failed"),
    }
    slot.finish(reason);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::protocol::testing::{Toy, ToyProtocol, REPLY};

    #[test]
    fn test_offer_collects_until_last_key() {
        // Arrange
        let slot = PumpSlot::<ToyProtocol>::new();
        let (tx, mut rx) = oneshot::channel();
        slot.register(Waiter::new(vec![4, 5], tx)).unwrap();
        let frame = |key| Toy { kind: REPLY, key };

        // Act
        assert!(slot.offer(9, frame(9)).is_some());
        assert!(slot.offer(4, frame(4)).is_none());
        assert!(rx.try_recv().is_err(), "batch not complete yet");
        assert!(slot.offer(5, frame(5)).is_none());

        // Assert
        let got = rx.try_recv().unwrap().unwrap();
        assert_eq!(got, vec![frame(4), frame(5)]);
        assert!(slot.offer(5, frame(5)).is_some(), "waiter is gone");
    }

    #[test]
    fn test_finish_fails_waiter_and_blocks_registration() {
        let slot = PumpSlot::<ToyProtocol>::new();
        let (tx, mut rx) = oneshot::channel();
        slot.register(Waiter::new(vec![1], tx)).unwrap();

        slot.finish(ClientError::Closed);

        assert!(matches!(rx.try_recv(), Ok(Err(ClientError::Closed))));
        let (tx2, _rx2) = oneshot::channel();
        assert!(matches!(
            slot.register(Waiter::new(vec![2], tx2)),
            Err(ClientError::PumpEnded)
        ));
    }
}
