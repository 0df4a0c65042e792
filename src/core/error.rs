//! Error types for the stream adaptors.

use std::io;

/// The main error type for the stream adaptors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The underlying source or sink failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The stream was forcibly closed because its cancellation token fired
    #[error("IO terminated")]
    Terminated,

    /// A chunk channel was closed before the handoff completed
    #[error("Channel was closed")]
    ChannelClosed,

    /// A stream was configured with unusable settings
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A stream was constructed outside of a tokio runtime
    #[error("No tokio runtime is available to drive the stream")]
    NoRuntime,

    /// A blocking read, write or close panicked
    #[error("Worker failed: {0}")]
    Worker(String),
}

impl Error {
    /// Create an invalid configuration error
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Error::InvalidConfig(message.into())
    }

    /// Whether this error was produced by cancellation
    pub fn is_terminated(&self) -> bool {
        matches!(self, Error::Terminated)
    }

    /// The I/O error kind, if this is an I/O error
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Error::Io(e) => Some(e.kind()),
            _ => None,
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Worker(e.to_string())
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, Error>;
