//! Lifecycle monitor.
//!
//! Races a stream's completion against its cancellation token. If the token
//! fires while the stream is still running, the stream's error cell is set to
//! [`Error::Terminated`](crate::core::Error::Terminated) and its closer is invoked, which unblocks any pending
//! blocking call so the worker can exit. If the stream has already completed,
//! nothing happens, even when the token has fired since.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use super::{Completion, ErrorCell};
use crate::core::{Closer, Result};
use crate::telemetry::{self, log_debug, log_warn};

/// How a monitor finished.
#[derive(Debug)]
pub(crate) enum Outcome {
    /// The stream completed on its own
    Completed,
    /// Cancellation fired and the resource was closed
    Closed,
    /// Cancellation fired but closing the resource failed
    CloseFailed,
}

pub(crate) fn spawn(
    runtime: &Handle,
    closer: Arc<dyn Closer>,
    done: Completion,
    errors: ErrorCell,
    token: CancellationToken,
) {
    runtime.spawn(async move {
        let _outcome = watch(closer, done, errors, token).await;
        log_debug!(outcome = ?_outcome, "monitor finished");
    });
}

/// When both signals are ready, completion is taken.
pub(crate) async fn watch(
    closer: Arc<dyn Closer>,
    done: Completion,
    errors: ErrorCell,
    token: CancellationToken,
) -> Outcome {
    tokio::select! {
        biased;
        _ = done.wait() => Outcome::Completed,
        _ = token.cancelled() => {
            errors.terminate();
            telemetry::stream_terminated();
            log_debug!("cancellation requested, closing stream");

            match close(closer).await {
                Ok(()) => Outcome::Closed,
                Err(err) => {
                    log_warn!(error = %err, "failed to close stream");
                    Outcome::CloseFailed
                }
            }
        }
    }
}

async fn close(closer: Arc<dyn Closer>) -> Result<()> {
    tokio::task::spawn_blocking(move || closer.close()).await??;
    Ok(())
}
