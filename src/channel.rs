//! Rendezvous channel used for every chunk handoff.
//!
//! A send completes only once the receiver has taken the item, so nothing is
//! ever buffered beyond the single in-flight handoff. Dropping a pending send
//! retracts its item: either the receiver took it before the drop, or it is
//! never delivered.
//!
//! The channel is multi-producer, single-consumer. It ends when every
//! [`Sender`] is dropped or when any handle calls `close`.

use std::fmt;
use std::future::{poll_fn, Future};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::core::{Error, Result};

/// One unit of bytes produced by a single read.
pub type Chunk = Vec<u8>;

/// Sending half of a chunk channel
pub type ChunkSender = Sender<Chunk>;

/// Receiving half of a chunk channel
pub type ChunkReceiver = Receiver<Chunk>;

type Slot<T> = Arc<Mutex<Option<T>>>;

fn take_slot<T>(slot: &Slot<T>) -> Option<T> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

struct Handoff<T> {
    slot: Slot<T>,
    taken: oneshot::Sender<()>,
}

impl<T> Handoff<T> {
    fn accept(self) -> Option<T> {
        let item = take_slot(&self.slot)?;
        let _ = self.taken.send(());
        Some(item)
    }
}

/// Takes the item back when a send is abandoned.
struct Retract<T>(Slot<T>);

impl<T> Drop for Retract<T> {
    fn drop(&mut self) {
        take_slot(&self.0);
    }
}

/// Create a rendezvous channel.
pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let (tx, rx) = mpsc::channel(1);
    let closed = CancellationToken::new();
    let sender = Sender {
        tx,
        closed: closed.clone(),
    };
    let receiver = Receiver {
        rx,
        closing: Box::pin(closed.clone().cancelled_owned()),
        closed,
    };
    (sender, receiver)
}

/// Sending half of a rendezvous channel.
pub struct Sender<T> {
    tx: mpsc::Sender<Handoff<T>>,
    closed: CancellationToken,
}

impl<T> Sender<T> {
    /// Hand `item` to the receiver, waiting until it has been taken.
    ///
    /// Fails with [`Error::ChannelClosed`] if the channel is closed or the
    /// receiver is gone before taking the item. If the returned future is
    /// dropped before completing, the item is not delivered.
    pub async fn send(&self, item: T) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(Error::ChannelClosed);
        }

        let slot = Arc::new(Mutex::new(Some(item)));
        let _retract = Retract(slot.clone());

        let permit = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return Err(Error::ChannelClosed),
            permit = self.tx.reserve() => permit.map_err(|_| Error::ChannelClosed)?,
        };

        let (taken, accepted) = oneshot::channel();
        permit.send(Handoff {
            slot: slot.clone(),
            taken,
        });

        tokio::select! {
            biased;
            result = accepted => result.map_err(|_| Error::ChannelClosed),
            _ = self.closed.cancelled() => match take_slot(&slot) {
                Some(_) => Err(Error::ChannelClosed),
                // Taken just before the close
                None => Ok(()),
            },
        }
    }

    /// Close the channel for every handle.
    ///
    /// Pending sends fail and the receiver observes the end of the channel.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Whether the channel has been closed or the receiver dropped
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.tx.is_closed()
    }
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            closed: self.closed.clone(),
        }
    }
}

impl<T> fmt::Debug for Sender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Receiving half of a rendezvous channel.
pub struct Receiver<T> {
    rx: mpsc::Receiver<Handoff<T>>,
    closed: CancellationToken,
    closing: Pin<Box<WaitForCancellationFutureOwned>>,
}

impl<T> Receiver<T> {
    /// Receive the next item, or `None` once the channel has ended.
    pub async fn recv(&mut self) -> Option<T> {
        poll_fn(|cx| self.poll_recv(cx)).await
    }

    /// Poll for the next item.
    pub fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<T>> {
        loop {
            match self.rx.poll_recv(cx) {
                Poll::Ready(Some(handoff)) => {
                    // Retracted handoffs are skipped
                    if let Some(item) = handoff.accept() {
                        return Poll::Ready(Some(item));
                    }
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => {
                    if self.closed.is_cancelled() || self.closing.as_mut().poll(cx).is_ready() {
                        self.shut_down();
                        return Poll::Ready(None);
                    }
                    return Poll::Pending;
                }
            }
        }
    }

    /// Close the channel from the receiving side.
    pub fn close(&mut self) {
        self.closed.cancel();
        self.shut_down();
    }

    /// Whether the channel has been closed
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.rx.is_closed()
    }

    fn shut_down(&mut self) {
        self.rx.close();
        // Dropping a handoff releases its sender with an error
        while let Ok(handoff) = self.rx.try_recv() {
            drop(handoff);
        }
    }
}

impl<T> Stream for Receiver<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().poll_recv(cx)
    }
}

impl<T> fmt::Debug for Receiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("closed", &self.is_closed())
            .finish()
    }
}
