//! Sink implementations for std I/O types.
//!
//! Every chunk is written in full and flushed before the next one is taken.

use std::fs::File;
use std::io::{self, Stderr, Stdout};
use std::net::TcpStream;
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::process::ChildStdin;
use std::sync::Arc;

use crate::core::{Closer, Sink};
use crate::sources::{shared, SocketCloser};

fn write_chunk<W: io::Write + ?Sized>(writer: &mut W, chunk: &[u8]) -> io::Result<()> {
    writer.write_all(chunk)?;
    writer.flush()
}

/// Adapts any [`io::Write`] into a [`Sink`] without a close capability.
pub struct WriteSink<W> {
    inner: W,
}

impl<W> WriteSink<W> {
    /// Wrap a writer
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Consume the adaptor and return the writer
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: io::Write + Send + 'static> Sink for WriteSink<W> {
    fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        write_chunk(&mut self.inner, chunk)
    }
}

/// Pairs any [`io::Write`] with an explicit [`Closer`].
pub struct ClosableSink<W> {
    inner: W,
    closer: Arc<dyn Closer>,
}

impl<W> ClosableSink<W> {
    /// Wrap a writer together with the closer that can interrupt it
    pub fn new(inner: W, closer: Arc<dyn Closer>) -> Self {
        Self { inner, closer }
    }
}

impl<W: io::Write + Send + 'static> Sink for ClosableSink<W> {
    fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        write_chunk(&mut self.inner, chunk)
    }

    fn closer(&self) -> Option<Arc<dyn Closer>> {
        Some(self.closer.clone())
    }
}

impl Sink for TcpStream {
    fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        write_chunk(self, chunk)
    }

    fn closer(&self) -> Option<Arc<dyn Closer>> {
        shared(SocketCloser::tcp(self))
    }
}

#[cfg(unix)]
impl Sink for UnixStream {
    fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        write_chunk(self, chunk)
    }

    fn closer(&self) -> Option<Arc<dyn Closer>> {
        shared(SocketCloser::unix(self))
    }
}

macro_rules! write_sink {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Sink for $ty {
                fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
                    write_chunk(self, chunk)
                }
            }
        )*
    };
}

write_sink!(File, Stdout, Stderr, ChildStdin);
