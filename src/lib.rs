//! # Cancellable channel streams over blocking I/O
//!
//! This crate turns blocking, synchronous byte sources and sinks into
//! channel-based async streams that can be cancelled, and merges several
//! sources into one stream.
//!
//! ## Core Concepts
//!
//! - **Source / Sink**: a blocking read or write primitive, optionally
//!   closable from another thread
//! - **StreamReader**: publishes a source's chunks on a channel
//! - **StreamWriter**: writes the chunks it receives to a sink
//! - **MultiReader**: fans several readers into one channel
//! - **Cancellation**: a shared `CancellationToken` stops channel operations
//!   cooperatively and forces closable resources shut
//!
//! Errors never travel on the channels. Each stream keeps its last error in
//! a read-and-clear cell, to be checked once its channel has ended.
//!
//! ## Example
//!
//! ```rust
//! use std::io::Cursor;
//! use std::time::Duration;
//! use chanio::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let token = deadline_token(&CancellationToken::new(), Duration::from_secs(10))?;
//!     let sources = vec![Cursor::new(b"stdout".to_vec()), Cursor::new(b"stderr".to_vec())];
//!     let mut reader = MultiReader::new(sources, token)?;
//!
//!     while let Some(chunk) = reader.output().recv().await {
//!         print!("{}", String::from_utf8_lossy(&chunk));
//!     }
//!
//!     for error in reader.take_errors().into_iter().flatten() {
//!         eprintln!("read failed: {}", error);
//!     }
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod core;
pub mod sinks;
pub mod sources;
pub mod stream;
pub mod util;

mod telemetry;

// Re-export commonly used items
pub mod prelude {
    pub use crate::channel::{Chunk, ChunkReceiver, ChunkSender};
    pub use crate::core::{Closer, Error, FnCloser, Result, Sink, Source};
    pub use crate::sinks::{ClosableSink, WriteSink};
    pub use crate::sources::{ClosableSource, ReadSource};
    pub use crate::stream::{
        MultiReader, StreamConfig, StreamReader, StreamWriter, DEFAULT_BUFFER_SIZE,
    };
    pub use crate::util::{deadline_token, CancellableExt};
    pub use tokio_util::sync::CancellationToken;
}

// Re-export main error type
pub use crate::core::{Error, Result};

/// Metric names emitted with the `metrics` feature
#[cfg(feature = "metrics")]
pub use telemetry::names as metrics;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
