//! Core traits for the stream adaptors.
//!
//! A [`Source`] or [`Sink`] wraps a blocking byte-stream primitive. The
//! adaptors call it from tokio's blocking pool, so implementations are free
//! to block for as long as the underlying resource does.
//!
//! Interrupting a blocked call is the job of the optional [`Closer`]
//! capability: when a stream's cancellation token fires, the closer is
//! invoked from another thread to force the pending call to return.

use std::io;
use std::sync::Arc;

/// A blocking byte source.
///
/// # Examples
///
/// ```rust
/// use std::io;
/// use chanio::core::Source;
///
/// struct Countdown {
///     remaining: u8,
/// }
///
/// impl Source for Countdown {
///     fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
///         if self.remaining == 0 || buf.is_empty() {
///             return Ok(0); // End of stream
///         }
///         buf[0] = self.remaining;
///         self.remaining -= 1;
///         Ok(1)
///     }
/// }
/// ```
pub trait Source: Send + 'static {
    /// Read into `buf`, blocking until data, end of stream, or an error.
    ///
    /// `Ok(0)` with a non-empty `buf` marks a graceful end of stream.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// The close capability of this source, if it has one.
    ///
    /// Probed once when a stream is constructed.
    fn closer(&self) -> Option<Arc<dyn Closer>> {
        None
    }
}

/// A blocking byte sink.
///
/// # Examples
///
/// ```rust
/// use std::io;
/// use chanio::core::Sink;
///
/// struct ByteCounter {
///     total: usize,
/// }
///
/// impl Sink for ByteCounter {
///     fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
///         self.total += chunk.len();
///         Ok(())
///     }
/// }
/// ```
pub trait Sink: Send + 'static {
    /// Write the whole chunk, blocking until it has been accepted.
    fn write(&mut self, chunk: &[u8]) -> io::Result<()>;

    /// The close capability of this sink, if it has one.
    ///
    /// Probed once when a stream is constructed.
    fn closer(&self) -> Option<Arc<dyn Closer>> {
        None
    }
}

/// Forcibly closes a resource that another thread may be blocked on.
pub trait Closer: Send + Sync + 'static {
    /// Close the resource so that pending and future blocking calls return.
    fn close(&self) -> io::Result<()>;
}

/// A [`Closer`] backed by a closure.
pub struct FnCloser<F> {
    f: F,
}

impl<F> FnCloser<F>
where
    F: Fn() -> io::Result<()> + Send + Sync + 'static,
{
    /// Create a closer from a function
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Create a shareable closer from a function
    pub fn shared(f: F) -> Arc<dyn Closer> {
        Arc::new(Self::new(f))
    }
}

impl<F> Closer for FnCloser<F>
where
    F: Fn() -> io::Result<()> + Send + Sync + 'static,
{
    fn close(&self) -> io::Result<()> {
        (self.f)()
    }
}

impl<S: Source + ?Sized> Source for Box<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn closer(&self) -> Option<Arc<dyn Closer>> {
        (**self).closer()
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        (**self).write(chunk)
    }

    fn closer(&self) -> Option<Arc<dyn Closer>> {
        (**self).closer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Ones;

    impl Source for Ones {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            buf.fill(1);
            Ok(buf.len())
        }
    }

    #[test]
    fn test_default_source_has_no_closer() {
        let mut source = Ones;
        let mut buf = [0u8; 3];
        assert_eq!(source.read(&mut buf).unwrap(), 3);
        assert_eq!(buf, [1, 1, 1]);
        assert!(source.closer().is_none());
    }

    #[test]
    fn test_fn_closer_invokes_closure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let closer = FnCloser::shared(move || {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        closer.close().unwrap();
        closer.close().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_boxed_source_delegates() {
        let mut boxed: Box<dyn Source> = Box::new(Ones);
        let mut buf = [0u8; 2];
        assert_eq!(boxed.read(&mut buf).unwrap(), 2);
        assert!(boxed.closer().is_none());
    }
}
