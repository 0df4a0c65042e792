//! Channel-based writer over a blocking [`Sink`].

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use super::{monitor, Completion, ErrorCell};
use crate::channel::{self, ChunkReceiver, ChunkSender};
use crate::core::{Error, Result, Sink};
use crate::telemetry::{self, log_debug, log_trace, log_warn};
use crate::util::CancellableExt;

/// Writes the chunks sent on a channel to a [`Sink`].
///
/// Chunks are written in the order they are received, each on tokio's
/// blocking pool. A failed write does not stop the writer; the most recent
/// unread failure is kept for [`take_error`](Self::take_error). The writer
/// stops when its input is closed or when the token fires, in which case
/// chunks not yet taken from the input are never written.
///
/// # Examples
///
/// ```rust
/// use chanio::prelude::*;
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let file = tempfile::tempfile()?;
///     let writer = StreamWriter::new(file, CancellationToken::new())?;
///
///     writer.input().send(b"hello".to_vec()).await?;
///     writer.close();
///     writer.finished().await;
///
///     assert!(writer.take_error().is_none());
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct StreamWriter {
    input: ChunkSender,
    errors: ErrorCell,
    done: Completion,
}

impl StreamWriter {
    /// Start writing to `sink`.
    ///
    /// Must be called within a tokio runtime. If the sink has a close
    /// capability, a lifecycle monitor closes it when `token` fires.
    pub fn new<S: Sink>(sink: S, token: CancellationToken) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let (input, receiver) = channel::channel();
        let errors = ErrorCell::new();
        let done = Completion::new();
        let closer = sink.closer();

        let write_loop = WriteLoop {
            sink,
            input: receiver,
            errors: errors.clone(),
            done: done.clone(),
            token: token.clone(),
        };
        runtime.spawn(write_loop.run());

        if let Some(closer) = closer {
            monitor::spawn(&runtime, closer, done.clone(), errors.clone(), token);
        }

        Ok(Self {
            input,
            errors,
            done,
        })
    }

    /// The send-only handle for chunks.
    ///
    /// A send completes once the writer has taken the chunk. Clones of the
    /// handle keep the input open until they are dropped or closed.
    pub fn input(&self) -> &ChunkSender {
        &self.input
    }

    /// Close the input. The writer exits after its current write.
    pub fn close(&self) {
        self.input.close();
    }

    /// Take the last recorded error, leaving the cell empty
    pub fn take_error(&self) -> Option<Error> {
        self.errors.take()
    }

    /// Wait until the write loop has exited
    pub async fn finished(&self) {
        self.done.wait().await
    }

    /// Whether the write loop has exited
    pub fn is_finished(&self) -> bool {
        self.done.is_fired()
    }
}

struct WriteLoop<S> {
    sink: S,
    input: ChunkReceiver,
    errors: ErrorCell,
    done: Completion,
    token: CancellationToken,
}

impl<S: Sink> WriteLoop<S> {
    async fn run(self) {
        let WriteLoop {
            mut sink,
            mut input,
            errors,
            done,
            token,
        } = self;
        log_debug!("writer started");

        loop {
            let chunk = match input.recv().cancellable(&token).await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => {
                    log_debug!("writer input closed");
                    break;
                }
                Err(_) => {
                    log_debug!("writer cancelled");
                    break;
                }
            };

            let len = chunk.len();
            let write = tokio::task::spawn_blocking(move || {
                let result = sink.write(&chunk);
                (sink, result)
            })
            .await;

            let (returned, result) = match write {
                Ok(write) => write,
                Err(err) => {
                    record(&errors, err.into(), &token);
                    break;
                }
            };
            sink = returned;

            match result {
                Ok(()) => {
                    log_trace!(len, "wrote chunk");
                    telemetry::chunk_written(len);
                }
                Err(err) => record(&errors, err.into(), &token),
            }
        }

        // Pending sends fail once the input is gone
        drop(input);
        done.fire();
        log_debug!("writer finished");
    }
}

fn record(errors: &ErrorCell, err: Error, token: &CancellationToken) {
    if token.is_cancelled() {
        log_debug!(error = %err, "write error after cancellation ignored");
    } else {
        log_warn!(error = %err, "write failed");
    }
    if errors.record_unless_cancelled(err, token) {
        telemetry::stream_error();
    }
}
