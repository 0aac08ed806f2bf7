//! Protocol-agnostic connection engine.
//!
//! # How requests and answers meet (for beginners)
//!
//! Both protocols are request/response over one socket, with unsolicited
//! notifications interleaved.  Every request gets a number from a counter
//! (the display protocol's implicit sequence number, the audio protocol's
//! explicit tag), and every answer carries the number back.
//!
//! The engine has two read modes:
//!
//! - **Direct** (the default): the caller that sent a request reads the
//!   socket itself until its answer shows up.  Notifications read along the
//!   way go to the drain hook, or are discarded.
//! - **Pumped**: after [`Engine::start_pump`], a background task owns the
//!   socket.  Callers register a waiter before writing and sleep until the
//!   pump hands them their answer; notifications go to a bounded queue.
//!
//! Round trips are serialized: at most one batch of requests is awaiting
//! answers at any time.  Requests that expect no answer skip that lock and
//! only contend for the writer.

pub mod protocol;
pub mod queue;

pub(crate) mod outbound;
pub(crate) mod pump;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use futures_util::StreamExt;
use tether_core::DecodeError;
use tokio::net::UnixStream;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::error::ClientError;
use outbound::Outbound;
use pump::{Framed, PumpSlot, Waiter};

pub use protocol::{FrameClass, FrameCodec, WireProtocol};
pub use queue::{EventConsumer, EventProducer, PushOutcome, QueueClosed};

/// Callback for notifications read in direct mode.
pub type DrainHook<F> = Box<dyn FnMut(F) + Send>;

enum ReadSide<P: WireProtocol> {
    Direct(Framed<P>),
    Pumped(JoinHandle<()>),
    Ended,
}

struct ReadFailure {
    error: ClientError,
    /// The stream can no longer be read.
    fatal: bool,
}

impl ReadFailure {
    fn fatal(error: ClientError) -> Self {
        Self { error, fatal: true }
    }
}

/// One connection: a writer, a reader, and the bookkeeping between them.
pub struct Engine<P: WireProtocol> {
    outbound: Outbound,
    reads: Mutex<ReadSide<P>>,
    slot: Arc<PumpSlot<P>>,
    drain: StdMutex<Option<DrainHook<P::Frame>>>,
    cancel: CancellationToken,
    closed: AtomicBool,
}

impl<P: WireProtocol> Engine<P> {
    /// Takes over a connected socket whose handshake bytes have already
    /// been exchanged.  `first` is the number of the first request.
    pub fn new(stream: UnixStream, first: u64) -> Self {
        let (read, write) = stream.into_split();
        Self {
            outbound: Outbound::new(write, first),
            reads: Mutex::new(ReadSide::Direct(FramedRead::new(read, FrameCodec::new()))),
            slot: Arc::new(PumpSlot::new()),
            drain: StdMutex::new(None),
            cancel: CancellationToken::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), ClientError> {
        if self.closed.load(Ordering::Acquire) {
            Err(ClientError::Closed)
        } else {
            Ok(())
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Installs the callback for notifications read in direct mode,
    /// replacing any previous one.
    pub fn set_drain_hook(&self, hook: impl FnMut(P::Frame) + Send + 'static) {
        *self.drain.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
    }

    fn drain(&self, frame: P::Frame) {
        let mut hook = self.drain.lock().unwrap_or_else(PoisonError::into_inner);
        match hook.as_mut() {
            Some(hook) => hook(frame),
            None => trace!(protocol = P::NAME, "discarding notification"),
        }
    }

    // ── Writes ────────────────────────────────────────────────────────────────

    /// Writes one request that expects no answer.  Returns its number.
    pub async fn send(&self, request: &[u8]) -> Result<u64, ClientError> {
        self.ensure_open()?;
        let mut out = self.outbound.lock().await;
        let number = out.write_request(request).await?;
        trace!(protocol = P::NAME, number, len = request.len(), "request written");
        Ok(number)
    }

    /// Writes several requests back to back; nothing else is interleaved.
    /// Returns the number of the first.
    pub async fn send_batch(&self, requests: &[Vec<u8>]) -> Result<u64, ClientError> {
        self.ensure_open()?;
        let mut out = self.outbound.lock().await;
        let first = out.next_number();
        for request in requests {
            out.write_request(request).await?;
        }
        trace!(protocol = P::NAME, first, count = requests.len(), "batch written");
        Ok(first)
    }

    /// Writes frames that do not consume request numbers (stream data).
    pub async fn send_raw(&self, frames: &[Vec<u8>]) -> Result<(), ClientError> {
        self.ensure_open()?;
        let mut out = self.outbound.lock().await;
        for frame in frames {
            out.write_raw(frame).await?;
        }
        out.flush().await
    }

    // ── Round trips ───────────────────────────────────────────────────────────

    /// Sends the request built for the next number and returns its answer.
    pub async fn round_trip<F>(&self, build: F) -> Result<P::Frame, ClientError>
    where
        F: FnOnce(u64) -> Result<Vec<u8>, ClientError>,
    {
        let mut frames = self
            .round_trip_batch(|first| Ok(vec![build(first)?]))
            .await?;
        frames.pop().ok_or_else(|| {
            ClientError::Decode(DecodeError::Malformed("round trip produced no answer".into()))
        })
    }

    /// Sends a batch of requests, numbered consecutively from the number
    /// passed to `build`, and waits for the answer to the last one.
    ///
    /// Returns every answer that arrived for any request in the batch, in
    /// arrival order, ending with the last request's answer.  This is how a
    /// request without a reply is checked: follow it with one that has a
    /// reply, and any error for the first shows up before the second's
    /// answer.
    pub async fn round_trip_batch<F>(&self, build: F) -> Result<Vec<P::Frame>, ClientError>
    where
        F: FnOnce(u64) -> Result<Vec<Vec<u8>>, ClientError>,
    {
        self.ensure_open()?;
        let mut reads = self.reads.lock().await;
        match &*reads {
            ReadSide::Ended => return Err(ClientError::Closed),
            ReadSide::Pumped(_) => return self.round_trip_pumped(build).await,
            ReadSide::Direct(_) => {}
        }

        let keys = {
            let mut out = self.outbound.lock().await;
            let first = out.next_number();
            let requests = build(first)?;
            let mut keys = Vec::with_capacity(requests.len());
            for request in &requests {
                keys.push(P::key_for(out.write_request(request).await?));
            }
            keys
        };
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let outcome = match &mut *reads {
            ReadSide::Direct(framed) => self.await_replies(framed, &keys).await,
            _ => Err(ReadFailure::fatal(ClientError::Closed)),
        };
        outcome.map_err(|failure| {
            if failure.fatal {
                debug!(protocol = P::NAME, error = %failure.error, "read side ended");
                *reads = ReadSide::Ended;
            }
            failure.error
        })
    }

    async fn round_trip_pumped<F>(&self, build: F) -> Result<Vec<P::Frame>, ClientError>
    where
        F: FnOnce(u64) -> Result<Vec<Vec<u8>>, ClientError>,
    {
        let (tx, rx) = oneshot::channel();
        {
            let mut out = self.outbound.lock().await;
            let first = out.next_number();
            let requests = build(first)?;
            if requests.is_empty() {
                return Ok(Vec::new());
            }
            let keys = (0..requests.len() as u64)
                .map(|i| P::key_for(first + i))
                .collect();
            self.slot.register(Waiter::new(keys, tx))?;
            for request in &requests {
                if let Err(e) = out.write_request(request).await {
                    self.slot.clear();
                    return Err(e);
                }
            }
        }
        rx.await.unwrap_or(Err(ClientError::PumpEnded))
    }

    /// Direct-mode demultiplexer: reads until the last key's answer.
    async fn await_replies(
        &self,
        framed: &mut Framed<P>,
        keys: &[P::Key],
    ) -> Result<Vec<P::Frame>, ReadFailure> {
        let (Some(&first), Some(&last)) = (keys.first(), keys.last()) else {
            return Ok(Vec::new());
        };
        let mut collected = Vec::new();
        loop {
            let frame = match framed.next().await {
                Some(Ok(Ok(frame))) => frame,
                Some(Ok(Err(e))) => {
                    return Err(ReadFailure {
                        error: ClientError::Decode(e),
                        fatal: false,
                    })
                }
                Some(Err(e)) => return Err(ReadFailure::fatal(e)),
                None => return Err(ReadFailure::fatal(ClientError::Closed)),
            };
            match P::classify(&frame) {
                FrameClass::Notification => self.drain(frame),
                FrameClass::Reply(key) | FrameClass::Error(key) if keys.contains(&key) => {
                    collected.push(frame);
                    if key == last {
                        return Ok(collected);
                    }
                }
                FrameClass::Error(key) => {
                    debug!(protocol = P::NAME, ?key, "asynchronous error for an unawaited request");
                    self.drain(frame);
                }
                FrameClass::Reply(key) if P::issued_before(key, first) => {
                    debug!(
                        protocol = P::NAME,
                        ?key,
                        "stale reply for an abandoned request, skipped"
                    );
                }
                FrameClass::Reply(key) => {
                    return Err(ReadFailure {
                        error: ClientError::Decode(DecodeError::UnexpectedReply {
                            expected: format!("{keys:?}"),
                            got: format!("{key:?}"),
                        }),
                        fatal: false,
                    })
                }
            }
        }
    }

    // ── Pump ──────────────────────────────────────────────────────────────────

    /// Moves reading to a background task and returns the consumer of its
    /// event queue, which holds at most `capacity` events.
    ///
    /// # Errors
    ///
    /// [`ClientError::PumpRunning`] if a pump is already running,
    /// [`ClientError::PumpEnded`] if a previous pump has stopped.
    pub async fn start_pump(
        &self,
        capacity: usize,
    ) -> Result<EventConsumer<P::Frame>, ClientError> {
        self.ensure_open()?;
        let mut reads = self.reads.lock().await;
        let framed = match std::mem::replace(&mut *reads, ReadSide::Ended) {
            ReadSide::Direct(framed) => framed,
            ReadSide::Pumped(handle) => {
                let finished = handle.is_finished();
                *reads = ReadSide::Pumped(handle);
                return Err(if finished {
                    ClientError::PumpEnded
                } else {
                    ClientError::PumpRunning
                });
            }
            ReadSide::Ended => return Err(ClientError::Closed),
        };
        let (producer, consumer) = queue::bounded(capacity);
        let handle = tokio::spawn(pump::run(
            framed,
            Arc::clone(&self.slot),
            producer,
            self.cancel.child_token(),
        ));
        *reads = ReadSide::Pumped(handle);
        info!(protocol = P::NAME, capacity, "reads handed to event pump");
        Ok(consumer)
    }

    /// Token that stops the pump; cancelling it is equivalent to the
    /// pump's half of [`close`](Self::close).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stops the pump and shuts the socket down for writing.  Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel.cancel();
        self.outbound.shutdown().await;
        info!(protocol = P::NAME, "connection closed");
    }
}

impl<P: WireProtocol> Drop for Engine<P> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
