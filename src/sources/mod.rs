//! Source implementations for std I/O types.
//!
//! Sockets are closable: their closer shuts the connection down through a
//! cloned handle, which makes a blocked read return. Files, pipes and
//! in-memory cursors are not; a reader blocked on one of them only stops
//! when the read itself returns.

use std::fs::File;
use std::io::{self, Cursor, Stdin};
use std::net::{Shutdown, TcpStream};
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::process::{ChildStderr, ChildStdout};
use std::sync::Arc;

use crate::core::{Closer, Source};

/// Adapts any [`io::Read`] into a [`Source`] without a close capability.
pub struct ReadSource<R> {
    inner: R,
}

impl<R> ReadSource<R> {
    /// Wrap a reader
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Consume the adaptor and return the reader
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: io::Read + Send + 'static> Source for ReadSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(&mut self.inner, buf)
    }
}

/// Pairs any [`io::Read`] with an explicit [`Closer`].
pub struct ClosableSource<R> {
    inner: R,
    closer: Arc<dyn Closer>,
}

impl<R> ClosableSource<R> {
    /// Wrap a reader together with the closer that can interrupt it
    pub fn new(inner: R, closer: Arc<dyn Closer>) -> Self {
        Self { inner, closer }
    }
}

impl<R: io::Read + Send + 'static> Source for ClosableSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(&mut self.inner, buf)
    }

    fn closer(&self) -> Option<Arc<dyn Closer>> {
        Some(self.closer.clone())
    }
}

/// Shuts a socket down in both directions through its own handle.
#[derive(Debug)]
pub struct SocketCloser<T> {
    socket: T,
}

impl SocketCloser<TcpStream> {
    /// Create a closer for `stream` from a cloned handle
    pub fn tcp(stream: &TcpStream) -> io::Result<Self> {
        Ok(Self {
            socket: stream.try_clone()?,
        })
    }
}

impl Closer for SocketCloser<TcpStream> {
    fn close(&self) -> io::Result<()> {
        self.socket.shutdown(Shutdown::Both)
    }
}

#[cfg(unix)]
impl SocketCloser<UnixStream> {
    /// Create a closer for `stream` from a cloned handle
    pub fn unix(stream: &UnixStream) -> io::Result<Self> {
        Ok(Self {
            socket: stream.try_clone()?,
        })
    }
}

#[cfg(unix)]
impl Closer for SocketCloser<UnixStream> {
    fn close(&self) -> io::Result<()> {
        self.socket.shutdown(Shutdown::Both)
    }
}

pub(crate) fn shared<C: Closer>(closer: io::Result<C>) -> Option<Arc<dyn Closer>> {
    // Without a cloned handle the stream simply has no close capability
    closer.ok().map(|closer| Arc::new(closer) as Arc<dyn Closer>)
}

impl Source for TcpStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(self, buf)
    }

    fn closer(&self) -> Option<Arc<dyn Closer>> {
        shared(SocketCloser::tcp(self))
    }
}

#[cfg(unix)]
impl Source for UnixStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(self, buf)
    }

    fn closer(&self) -> Option<Arc<dyn Closer>> {
        shared(SocketCloser::unix(self))
    }
}

macro_rules! read_source {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Source for $ty {
                fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                    io::Read::read(self, buf)
                }
            }
        )*
    };
}

read_source!(
    File,
    Stdin,
    ChildStdout,
    ChildStderr,
    Cursor<Vec<u8>>,
    Cursor<&'static [u8]>,
);
