//! Cancellation helpers.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::core::{Error, Result};

/// A future that resolves to [`Error::Terminated`] once its token fires.
///
/// Cancellation is checked before the inner future on every poll, so if
/// both are ready at once, cancellation wins.
pub struct Cancellable<F> {
    future: Pin<Box<F>>,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
}

impl<F> Cancellable<F> {
    /// Create a new cancellable future
    pub fn new(future: F, token: &CancellationToken) -> Self {
        Self {
            future: Box::pin(future),
            cancelled: Box::pin(token.clone().cancelled_owned()),
        }
    }
}

impl<F: Future> Future for Cancellable<F> {
    type Output = Result<F::Output>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.cancelled.as_mut().poll(cx).is_ready() {
            return Poll::Ready(Err(Error::Terminated));
        }

        match self.future.as_mut().poll(cx) {
            Poll::Ready(output) => Poll::Ready(Ok(output)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Extension trait for making futures cancellable
pub trait CancellableExt: Future + Sized {
    /// Race this future against `token`
    fn cancellable(self, token: &CancellationToken) -> Cancellable<Self> {
        Cancellable::new(self, token)
    }
}

impl<F: Future> CancellableExt for F {}

/// Derive a token that fires after `timeout` or when `parent` fires.
///
/// The timer runs on the current tokio runtime and stops early if the
/// returned token is cancelled by other means.
pub fn deadline_token(parent: &CancellationToken, timeout: Duration) -> Result<CancellationToken> {
    let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
    let token = parent.child_token();
    let timer = token.clone();

    runtime.spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => timer.cancel(),
            _ = timer.cancelled() => {}
        }
    });

    Ok(token)
}
