//! Core traits and types for the chanio library.
//!
//! This module contains the blocking I/O capabilities the stream adaptors
//! drive and the error type they report.

pub mod error;
pub mod traits;

// Re-export core items
pub use error::{Error, Result};
pub use traits::{Closer, FnCloser, Sink, Source};
