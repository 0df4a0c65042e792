//! Logging and metrics hooks.
//!
//! Both are compiled out unless the `tracing` / `metrics` features are on.

macro_rules! log_trace {
    ($($arg:tt)+) => {
        #[cfg(feature = "tracing")]
        {
            ::tracing::trace!($($arg)+);
        }
    };
}

macro_rules! log_debug {
    ($($arg:tt)+) => {
        #[cfg(feature = "tracing")]
        {
            ::tracing::debug!($($arg)+);
        }
    };
}

macro_rules! log_warn {
    ($($arg:tt)+) => {
        #[cfg(feature = "tracing")]
        {
            ::tracing::warn!($($arg)+);
        }
    };
}

pub(crate) use {log_debug, log_trace, log_warn};

/// Metric names emitted with the `metrics` feature.
#[cfg(feature = "metrics")]
pub mod names {
    pub const CHUNKS_READ: &str = "chanio_chunks_read_total";
    pub const BYTES_READ: &str = "chanio_bytes_read_total";
    pub const CHUNKS_WRITTEN: &str = "chanio_chunks_written_total";
    pub const BYTES_WRITTEN: &str = "chanio_bytes_written_total";
    pub const STREAM_ERRORS: &str = "chanio_stream_errors_total";
    pub const STREAMS_TERMINATED: &str = "chanio_streams_terminated_total";
}

#[cfg(feature = "metrics")]
pub(crate) fn chunk_read(len: usize) {
    metrics::counter!(names::CHUNKS_READ).increment(1);
    metrics::counter!(names::BYTES_READ).increment(len as u64);
}

#[cfg(not(feature = "metrics"))]
pub(crate) fn chunk_read(_len: usize) {}

#[cfg(feature = "metrics")]
pub(crate) fn chunk_written(len: usize) {
    metrics::counter!(names::CHUNKS_WRITTEN).increment(1);
    metrics::counter!(names::BYTES_WRITTEN).increment(len as u64);
}

#[cfg(not(feature = "metrics"))]
pub(crate) fn chunk_written(_len: usize) {}

#[cfg(feature = "metrics")]
pub(crate) fn stream_error() {
    metrics::counter!(names::STREAM_ERRORS).increment(1);
}

#[cfg(not(feature = "metrics"))]
pub(crate) fn stream_error() {}

#[cfg(feature = "metrics")]
pub(crate) fn stream_terminated() {
    metrics::counter!(names::STREAMS_TERMINATED).increment(1);
}

#[cfg(not(feature = "metrics"))]
pub(crate) fn stream_terminated() {}
