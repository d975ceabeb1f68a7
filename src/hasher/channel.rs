// src/hasher/channel.rs
// =============================================================================
// A zero-capacity (rendezvous) channel with many receivers.
//
// tokio's mpsc channels always buffer at least one value, so a plain
// `send().await` returns before anybody has taken the value. Here every
// value travels with a oneshot acknowledgement and `send` waits for it, so a
// successful send means some receiver has dequeued the value.
//
// The receiving half is shared: workers and the drainer all hold a clone and
// take turns on the underlying mpsc receiver.
// =============================================================================

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};

type Envelope<T> = (T, oneshot::Sender<()>);

/// Returned when every receiver is gone before the value was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Disconnected;

pub(crate) fn rendezvous<T>() -> (Sender<T>, Receiver<T>) {
    // One slot is enough: the single sender never has more than one
    // unacknowledged value outstanding.
    let (tx, rx) = mpsc::channel(1);
    (
        Sender { inner: tx },
        Receiver {
            inner: Arc::new(Mutex::new(rx)),
        },
    )
}

pub(crate) struct Sender<T> {
    inner: mpsc::Sender<Envelope<T>>,
}

impl<T> Sender<T> {
    /// Hands `value` to a receiver, waiting until one has taken it.
    ///
    /// Dropping the sender closes the channel.
    pub(crate) async fn send(&self, value: T) -> Result<(), Disconnected> {
        let (ack_tx, ack_rx) = oneshot::channel();
        // Returns as soon as the value sits in the buffer slot
        self.inner
            .send((value, ack_tx))
            .await
            .map_err(|_| Disconnected)?;
        // The envelope is dropped unacknowledged if the last receiver goes away
        ack_rx.await.map_err(|_| Disconnected)
    }
}

pub(crate) struct Receiver<T> {
    inner: Arc<Mutex<mpsc::Receiver<Envelope<T>>>>,
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Receiver<T> {
    /// Takes the next value, or `None` once the sender is dropped.
    ///
    /// Cancel safe: dropping the future before it resolves loses nothing.
    pub(crate) async fn recv(&self) -> Option<T> {
        // Holding the lock across `recv` serializes receivers; the guard is
        // dropped before anything else can be awaited
        let (value, ack) = self.inner.lock().await.recv().await?;
        // No await between dequeue and ack.
        // The sender may have stopped waiting; the value is ours regardless
        let _ = ack.send(());
        Some(value)
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why the oneshot ack?
//    - With capacity 1, `mpsc::Sender::send` completes once the value is
//      buffered, before any receiver has seen it
//    - Waiting on the ack moves the completion point to "a receiver has
//      dequeued it", which is what a zero-capacity channel promises
//    - The dispatcher therefore never runs ahead of the workers: at most one
//      URL is taken out of the input and not yet owned by a worker
//
// 2. Why a Mutex around the receiver?
//    - tokio's mpsc has a single consumer; the pool has `parallel` workers
//      plus the drainer
//    - tokio's Mutex is fair (FIFO), so waiting workers are served in turn
//
// 3. Cancel safety of `recv`
//    - Dropped while waiting for the lock: nothing happened
//    - Dropped while waiting in `mpsc::Receiver::recv`: also cancel safe,
//      the value stays in the channel for the next receiver
//    - Once the value is dequeued there is no further await, so a value is
//      never taken and then lost
// -----------------------------------------------------------------------------
