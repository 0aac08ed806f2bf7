//! Bounded event queue between the pump and the application.
//!
//! The pump must never wait on a slow consumer, so a full queue drops the
//! incoming item and keeps everything already queued.  Drops are counted and
//! logged.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tracing::{debug, warn};

/// The producer side has gone away and every queued item has been taken.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("event queue closed")]
pub struct QueueClosed;

/// What happened to an item handed to [`EventProducer::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// The queue was full; the item was discarded.
    Dropped,
    /// The consumer is gone; the item was discarded.
    Closed,
}

/// Creates a queue holding at most `capacity` items (minimum 1).
pub fn bounded<T>(capacity: usize) -> (EventProducer<T>, EventConsumer<T>) {
    let capacity = capacity.max(1);
    let (tx, rx) = mpsc::channel(capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    (
        EventProducer {
            tx,
            dropped: Arc::clone(&dropped),
        },
        EventConsumer { rx, dropped },
    )
}

pub struct EventProducer<T> {
    tx: mpsc::Sender<T>,
    dropped: Arc<AtomicU64>,
}

impl<T> EventProducer<T> {
    /// Queues `item` without waiting.
    pub fn push(&self, item: T) -> PushOutcome {
        match self.tx.try_send(item) {
            Ok(()) => PushOutcome::Queued,
            Err(TrySendError::Full(_)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(dropped_total = total, "event queue full, dropping newest event");
                PushOutcome::Dropped
            }
            Err(TrySendError::Closed(_)) => {
                debug!("event consumer gone, discarding event");
                PushOutcome::Closed
            }
        }
    }
}

pub struct EventConsumer<T> {
    rx: mpsc::Receiver<T>,
    dropped: Arc<AtomicU64>,
}

impl<T> EventConsumer<T> {
    /// Takes the next item if one is queued.
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosed`] once the pump has ended and the queue is
    /// drained.
    pub fn try_next(&mut self) -> Result<Option<T>, QueueClosed> {
        match self.rx.try_recv() {
            Ok(item) => Ok(Some(item)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(QueueClosed),
        }
    }

    /// Waits for the next item; `None` means the pump has ended.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Blocking variant of [`next`](Self::next) for consumers outside the
    /// runtime.  Panics if called from within an async context.
    pub fn blocking_next(&mut self) -> Option<T> {
        self.rx.blocking_recv()
    }

    /// Items discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_queue_drops_newest_and_keeps_order() {
        // Arrange
        let (tx, mut rx) = bounded::<u32>(3);

        // Act
        let outcomes: Vec<_> = (0..5).map(|i| tx.push(i)).collect();

        // Assert
        assert_eq!(
            outcomes,
            vec![
                PushOutcome::Queued,
                PushOutcome::Queued,
                PushOutcome::Queued,
                PushOutcome::Dropped,
                PushOutcome::Dropped
            ]
        );
        assert_eq!(rx.dropped(), 2);
        assert_eq!(rx.try_next(), Ok(Some(0)));
        assert_eq!(rx.try_next(), Ok(Some(1)));
        assert_eq!(rx.try_next(), Ok(Some(2)));
        assert_eq!(rx.try_next(), Ok(None));
    }

    #[test]
    fn test_room_frees_after_consumption() {
        let (tx, mut rx) = bounded::<u32>(1);
        assert_eq!(tx.push(1), PushOutcome::Queued);
        assert_eq!(tx.push(2), PushOutcome::Dropped);
        assert_eq!(rx.try_next(), Ok(Some(1)));
        assert_eq!(tx.push(3), PushOutcome::Queued);
        assert_eq!(rx.try_next(), Ok(Some(3)));
    }

    #[test]
    fn test_closed_after_producer_drop_and_drain() {
        let (tx, mut rx) = bounded::<u32>(4);
        tx.push(9);
        drop(tx);
        assert_eq!(rx.try_next(), Ok(Some(9)));
        assert_eq!(rx.try_next(), Err(QueueClosed));
    }

    #[test]
    fn test_push_after_consumer_drop_reports_closed() {
        let (tx, rx) = bounded::<u32>(4);
        drop(rx);
        assert_eq!(tx.push(1), PushOutcome::Closed);
    }

    #[test]
    fn test_zero_capacity_is_clamped_to_one() {
        let (tx, mut rx) = bounded::<u8>(0);
        assert_eq!(tx.push(1), PushOutcome::Queued);
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn test_blocking_next_outside_runtime() {
        let (tx, mut rx) = bounded::<u8>(2);
        let handle = std::thread::spawn(move || {
            tx.push(5);
        });
        assert_eq!(rx.blocking_next(), Some(5));
        handle.join().unwrap();
        assert_eq!(rx.blocking_next(), None);
    }

    #[test]
    fn test_next_waits_until_an_item_is_pushed() {
        let (tx, mut rx) = bounded::<u8>(2);
        let mut next = tokio_test::task::spawn(rx.next());

        tokio_test::assert_pending!(next.poll());
        tx.push(4);

        assert!(next.is_woken());
        tokio_test::assert_ready_eq!(next.poll(), Some(4));
    }

    #[tokio::test]
    async fn test_async_next_ends_with_none() {
        let (tx, mut rx) = bounded::<u8>(2);
        tx.push(1);
        drop(tx);
        assert_eq!(rx.next().await, Some(1));
        assert_eq!(rx.next().await, None);
    }
}
