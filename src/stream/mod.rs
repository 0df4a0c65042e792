//! Channel-based streams over blocking sources and sinks.
//!
//! Each stream owns a worker task that drives its [`Source`](crate::core::Source)
//! or [`Sink`](crate::core::Sink) on tokio's blocking pool, a single-slot
//! error cell, and a completion signal fired once when the worker exits.
//! Streams with a close capability also get a lifecycle monitor that forces
//! the resource closed when the cancellation token fires first.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::core::{Error, Result};

pub mod monitor;
pub mod multi;
pub mod reader;
pub mod writer;

pub use multi::MultiReader;
pub use reader::StreamReader;
pub use writer::StreamWriter;

/// Bytes per chunk when no size is configured
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Configuration for stream construction
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StreamConfig {
    /// Maximum number of bytes in one chunk
    pub buffer_size: usize,
}

impl StreamConfig {
    /// Create a configuration with the default buffer size
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the buffer size
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Check that the configuration can drive a stream
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(Error::invalid_config("buffer size must be non-zero"));
        }
        Ok(())
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Single-slot, last-write-wins error holder with read-and-clear semantics.
///
/// A stream's worker records underlying errors through
/// [`record_unless_cancelled`](Self::record_unless_cancelled); its monitor
/// records [`Error::Terminated`] once the token has fired, before unblocking
/// the worker. An error the worker sees after that is dropped.
#[derive(Debug, Clone, Default)]
pub(crate) struct ErrorCell {
    slot: Arc<Mutex<Option<Error>>>,
}

impl ErrorCell {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Error>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `error` unless `token` has fired. Returns whether it was kept.
    pub(crate) fn record_unless_cancelled(&self, error: Error, token: &CancellationToken) -> bool {
        let mut slot = self.lock();
        if token.is_cancelled() {
            return false;
        }
        *slot = Some(error);
        true
    }

    pub(crate) fn terminate(&self) {
        *self.lock() = Some(Error::Terminated);
    }

    pub(crate) fn take(&self) -> Option<Error> {
        self.lock().take()
    }
}

/// Fired exactly once, when a worker's loop exits. Never reopens.
#[derive(Debug, Clone, Default)]
pub(crate) struct Completion {
    signal: CancellationToken,
}

impl Completion {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fire(&self) {
        self.signal.cancel();
    }

    pub(crate) fn wait(&self) -> WaitForCancellationFuture<'_> {
        self.signal.cancelled()
    }

    pub(crate) fn is_fired(&self) -> bool {
        self.signal.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_default_config() {
        let config = StreamConfig::default();
        assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_buffer_size_is_rejected() {
        let config = StreamConfig::new().buffer_size(0);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_error_cell_read_and_clear() {
        let cell = ErrorCell::new();
        let token = CancellationToken::new();

        assert!(cell.record_unless_cancelled(
            io::Error::new(io::ErrorKind::Other, "first").into(),
            &token
        ));
        assert!(cell.record_unless_cancelled(
            io::Error::new(io::ErrorKind::BrokenPipe, "second").into(),
            &token
        ));

        let err = cell.take().unwrap();
        assert_eq!(err.io_kind(), Some(io::ErrorKind::BrokenPipe));
        assert!(cell.take().is_none());
    }

    #[test]
    fn test_cancelled_error_is_suppressed() {
        let cell = ErrorCell::new();
        let token = CancellationToken::new();
        token.cancel();

        let kept = cell.record_unless_cancelled(
            io::Error::new(io::ErrorKind::ConnectionAborted, "closed").into(),
            &token,
        );
        assert!(!kept);
        assert!(cell.take().is_none());
    }

    #[test]
    fn test_terminate_overrides_recorded_error() {
        let cell = ErrorCell::new();
        let token = CancellationToken::new();

        cell.record_unless_cancelled(io::Error::new(io::ErrorKind::Other, "late").into(), &token);
        token.cancel();
        cell.terminate();

        assert!(cell.take().unwrap().is_terminated());
    }

    #[tokio::test]
    async fn test_completion_fires_once() {
        let done = Completion::new();
        assert!(!done.is_fired());

        done.fire();
        done.fire();
        done.wait().await;
        assert!(done.is_fired());
    }
}
