//! Fan-in over several [`StreamReader`]s.

use futures::future::join_all;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use super::{Completion, ErrorCell, StreamConfig, StreamReader};
use crate::channel::{self, ChunkReceiver, ChunkSender};
use crate::core::{Error, Result, Source};
use crate::telemetry::log_debug;
use crate::util::CancellableExt;

/// Merges the chunks of several sources into one channel.
///
/// Every source gets its own [`StreamReader`], all sharing one cancellation
/// token and buffer size. Chunks from one source arrive in read order; the
/// interleaving between sources is unspecified. The shared output ends once
/// every reader has stopped.
///
/// # Examples
///
/// ```rust
/// use std::io::Cursor;
/// use chanio::prelude::*;
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let sources = vec![Cursor::new(b"out".to_vec()), Cursor::new(b"err".to_vec())];
///     let mut multi = MultiReader::new(sources, CancellationToken::new())?;
///
///     let mut total = 0;
///     while let Some(chunk) = multi.output().recv().await {
///         total += chunk.len();
///     }
///
///     assert_eq!(total, 6);
///     assert!(multi.take_errors().iter().all(Option::is_none));
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MultiReader {
    output: ChunkReceiver,
    errors: Vec<ErrorCell>,
    done: Completion,
}

impl MultiReader {
    /// Read `sources` with the default configuration
    pub fn new<I, S>(sources: I, token: CancellationToken) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Source,
    {
        Self::with_config(sources, StreamConfig::default(), token)
    }

    /// Read `sources`, one reader per source in input order.
    ///
    /// Must be called within a tokio runtime.
    pub fn with_config<I, S>(sources: I, config: StreamConfig, token: CancellationToken) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Source,
    {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;

        let readers = sources
            .into_iter()
            .map(|source| {
                StreamReader::spawn(&runtime, source, config.buffer_size, token.clone()).into_parts()
            })
            .collect();
        Ok(Self::fan_in(&runtime, readers, token))
    }

    /// Forward every reader onto one shared channel.
    ///
    /// The shared channel closes once every forwarder has returned, and a
    /// forwarder returns only after its reader's completion has fired.
    fn fan_in(
        runtime: &Handle,
        readers: Vec<(ChunkReceiver, ErrorCell, Completion)>,
        token: CancellationToken,
    ) -> Self {
        let (shared, output) = channel::channel();

        let mut errors = Vec::with_capacity(readers.len());
        let mut forwarders = Vec::with_capacity(readers.len());
        for (chunks, cell, done) in readers {
            errors.push(cell);
            forwarders.push(runtime.spawn(forward(chunks, done, shared.clone(), token.clone())));
        }
        log_debug!(sources = forwarders.len(), "multi-reader started");

        let done = Completion::new();
        let finished = done.clone();
        runtime.spawn(async move {
            join_all(forwarders).await;
            // Every forwarder is gone, so this is the last sender
            drop(shared);
            finished.fire();
            log_debug!("multi-reader finished");
        });

        Self {
            output,
            errors,
            done,
        }
    }

    /// The shared chunk stream
    pub fn output(&mut self) -> &mut ChunkReceiver {
        &mut self.output
    }

    /// Take each reader's last error, in source order.
    ///
    /// Each slot is cleared as it is read, like
    /// [`StreamReader::take_error`].
    pub fn take_errors(&self) -> Vec<Option<Error>> {
        self.errors.iter().map(ErrorCell::take).collect()
    }

    /// Number of sources
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Whether there are no sources
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Wait until every reader has stopped and the output has closed
    pub async fn finished(&self) {
        self.done.wait().await
    }

    /// Whether every reader has stopped and the output has closed
    pub fn is_finished(&self) -> bool {
        self.done.is_fired()
    }
}

/// Moves one reader's chunks onto the shared channel.
///
/// A chunk is dropped only if cancellation wins the race to forward it.
async fn forward(
    mut chunks: ChunkReceiver,
    reader_done: Completion,
    shared: ChunkSender,
    token: CancellationToken,
) {
    loop {
        let chunk = match chunks.recv().cancellable(&token).await {
            Ok(Some(chunk)) => chunk,
            Ok(None) | Err(_) => break,
        };

        match shared.send(chunk).cancellable(&token).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) | Err(_) => break,
        }
    }

    // Unblock a reader still publishing, then outlive it
    drop(chunks);
    reader_done.wait().await;
}
