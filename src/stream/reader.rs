//! Channel-based reader over a blocking [`Source`].

use std::io;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use super::{monitor, Completion, ErrorCell, StreamConfig};
use crate::channel::{self, Chunk, ChunkReceiver, ChunkSender};
use crate::core::{Error, Result, Source};
use crate::telemetry::{self, log_debug, log_trace, log_warn};
use crate::util::CancellableExt;

/// Publishes the chunks read from a [`Source`] on a channel.
///
/// The source is read on tokio's blocking pool, one `buffer_size` chunk at a
/// time, and each chunk is handed to [`output`](Self::output) in read order.
/// The output ends on end of stream, on a read error, or on cancellation.
/// Errors are not sent on the channel: check [`take_error`](Self::take_error)
/// once the output has ended.
///
/// # Examples
///
/// ```rust
/// use std::io::Cursor;
/// use chanio::prelude::*;
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let source = Cursor::new(b"hello".to_vec());
///     let mut reader = StreamReader::new(source, CancellationToken::new())?;
///
///     let mut received = Vec::new();
///     while let Some(chunk) = reader.output().recv().await {
///         received.extend(chunk);
///     }
///
///     assert_eq!(received, b"hello");
///     assert!(reader.take_error().is_none());
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct StreamReader {
    output: ChunkReceiver,
    errors: ErrorCell,
    done: Completion,
}

impl StreamReader {
    /// Start reading `source` with the default configuration
    pub fn new<S: Source>(source: S, token: CancellationToken) -> Result<Self> {
        Self::with_config(source, StreamConfig::default(), token)
    }

    /// Start reading `source`.
    ///
    /// Must be called within a tokio runtime. If the source has a close
    /// capability, a lifecycle monitor closes it when `token` fires.
    pub fn with_config<S: Source>(
        source: S,
        config: StreamConfig,
        token: CancellationToken,
    ) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        Ok(Self::spawn(&runtime, source, config.buffer_size, token))
    }

    pub(crate) fn spawn<S: Source>(
        runtime: &Handle,
        source: S,
        buffer_size: usize,
        token: CancellationToken,
    ) -> Self {
        let (sender, output) = channel::channel();
        let errors = ErrorCell::new();
        let done = Completion::new();
        let closer = source.closer();

        let read_loop = ReadLoop {
            source,
            buffer_size,
            output: sender,
            errors: errors.clone(),
            done: done.clone(),
            token: token.clone(),
        };
        runtime.spawn(read_loop.run());

        if let Some(closer) = closer {
            monitor::spawn(runtime, closer, done.clone(), errors.clone(), token);
        }

        Self {
            output,
            errors,
            done,
        }
    }

    /// The chunk stream.
    ///
    /// Yields chunks in read order and ends once the reader has stopped.
    pub fn output(&mut self) -> &mut ChunkReceiver {
        &mut self.output
    }

    /// Take the last recorded error, leaving the cell empty.
    ///
    /// End of stream is not an error. If the token fires while a closable
    /// source is still being read, this returns [`Error::Terminated`].
    pub fn take_error(&self) -> Option<Error> {
        self.errors.take()
    }

    /// Wait until the read loop has exited
    pub async fn finished(&self) {
        self.done.wait().await
    }

    /// Whether the read loop has exited
    pub fn is_finished(&self) -> bool {
        self.done.is_fired()
    }

    pub(crate) fn into_parts(self) -> (ChunkReceiver, ErrorCell, Completion) {
        (self.output, self.errors, self.done)
    }
}

struct ReadLoop<S> {
    source: S,
    buffer_size: usize,
    output: ChunkSender,
    errors: ErrorCell,
    done: Completion,
    token: CancellationToken,
}

impl<S: Source> ReadLoop<S> {
    async fn run(self) {
        let ReadLoop {
            mut source,
            buffer_size,
            output,
            errors,
            done,
            token,
        } = self;
        log_debug!(buffer_size, "reader started");

        loop {
            let buf = vec![0u8; buffer_size];
            let read = tokio::task::spawn_blocking(move || {
                let mut buf = buf;
                let result = read_retrying(&mut source, &mut buf);
                (source, buf, result)
            })
            .await;

            let (returned, mut chunk, result) = match read {
                Ok(read) => read,
                Err(err) => {
                    record(&errors, err.into(), &token);
                    break;
                }
            };
            source = returned;

            match result {
                Ok(0) => {
                    log_debug!("reader reached end of stream");
                    break;
                }
                Ok(n) => {
                    chunk.truncate(n);
                    if !publish(&output, chunk, &token).await {
                        break;
                    }
                }
                Err(err) => {
                    record(&errors, err.into(), &token);
                    break;
                }
            }
        }

        // Close the output before signalling completion
        drop(output);
        done.fire();
        log_debug!("reader finished");
    }
}

fn read_retrying<S: Source>(source: &mut S, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match source.read(buf) {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}

/// Returns whether the loop should keep reading.
async fn publish(output: &ChunkSender, chunk: Chunk, token: &CancellationToken) -> bool {
    let len = chunk.len();
    match output.send(chunk).cancellable(token).await {
        Ok(Ok(())) => {
            log_trace!(len, "published chunk");
            telemetry::chunk_read(len);
            true
        }
        Ok(Err(_)) => {
            log_debug!("reader output dropped");
            false
        }
        Err(_) => {
            log_debug!("reader cancelled while publishing");
            false
        }
    }
}

fn record(errors: &ErrorCell, err: Error, token: &CancellationToken) {
    if token.is_cancelled() {
        log_debug!(error = %err, "read error after cancellation ignored");
    } else {
        log_warn!(error = %err, "reader stopped on error");
    }
    if errors.record_unless_cancelled(err, token) {
        telemetry::stream_error();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::Cursor;

    struct Scripted {
        steps: VecDeque<io::Result<Vec<u8>>>,
    }

    impl Source for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.steps.pop_front() {
                Some(Ok(data)) => {
                    buf[..data.len()].copy_from_slice(&data);
                    Ok(data.len())
                }
                Some(Err(err)) => Err(err),
                None => Ok(0),
            }
        }
    }

    async fn drain(reader: &mut StreamReader) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        while let Some(chunk) = reader.output().recv().await {
            chunks.push(chunk);
        }
        chunks
    }

    #[tokio::test]
    async fn test_chunks_respect_buffer_size() {
        let config = StreamConfig::new().buffer_size(4);
        let source = Cursor::new(b"abcdefghij".to_vec());
        let mut reader = StreamReader::with_config(source, config, CancellationToken::new()).unwrap();

        let chunks = drain(&mut reader).await;
        assert_eq!(chunks, vec![b"abcd".to_vec(), b"efgh".to_vec(), b"ij".to_vec()]);
        reader.finished().await;
        assert!(reader.is_finished());
        assert!(reader.take_error().is_none());
    }

    #[tokio::test]
    async fn test_interrupted_reads_are_retried() {
        let source = Scripted {
            steps: VecDeque::from(vec![
                Ok(b"one".to_vec()),
                Err(io::Error::new(io::ErrorKind::Interrupted, "signal")),
                Ok(b"two".to_vec()),
            ]),
        };
        let mut reader = StreamReader::new(source, CancellationToken::new()).unwrap();

        let chunks = drain(&mut reader).await;
        assert_eq!(chunks, vec![b"one".to_vec(), b"two".to_vec()]);
        assert!(reader.take_error().is_none());
    }

    #[tokio::test]
    async fn test_read_error_is_recorded_once() {
        let source = Scripted {
            steps: VecDeque::from(vec![
                Ok(b"one".to_vec()),
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
                Ok(b"never".to_vec()),
            ]),
        };
        let mut reader = StreamReader::new(source, CancellationToken::new()).unwrap();

        assert_eq!(drain(&mut reader).await, vec![b"one".to_vec()]);
        reader.finished().await;
        let err = reader.take_error().unwrap();
        assert_eq!(err.io_kind(), Some(io::ErrorKind::ConnectionReset));
        assert!(reader.take_error().is_none());
    }

    #[tokio::test]
    async fn test_panicking_source_is_reported() {
        struct Exploding;

        impl Source for Exploding {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                panic!("source exploded");
            }
        }

        let mut reader = StreamReader::new(Exploding, CancellationToken::new()).unwrap();
        assert!(drain(&mut reader).await.is_empty());
        reader.finished().await;
        assert!(matches!(reader.take_error(), Some(Error::Worker(_))));
    }

    #[tokio::test]
    async fn test_dropped_output_stops_reader() {
        let source = Cursor::new(vec![7u8; 64]);
        let config = StreamConfig::new().buffer_size(8);
        let reader = StreamReader::with_config(source, config, CancellationToken::new()).unwrap();

        let (output, errors, done) = reader.into_parts();
        drop(output);
        done.wait().await;
        assert!(errors.take().is_none());
    }

    #[tokio::test]
    async fn test_cancelled_reader_without_closer_records_nothing() {
        let token = CancellationToken::new();
        let source = Cursor::new(vec![1u8; 32]);
        let config = StreamConfig::new().buffer_size(8);
        let mut reader = StreamReader::with_config(source, config, token.clone()).unwrap();

        // The first publish waits for a receiver that never comes
        token.cancel();
        reader.finished().await;
        assert_eq!(reader.output().recv().await, None);
        assert!(reader.take_error().is_none());
    }

    #[test]
    fn test_construction_requires_runtime() {
        let result = StreamReader::new(Cursor::new(Vec::new()), CancellationToken::new());
        assert!(matches!(result, Err(Error::NoRuntime)));
    }

    #[tokio::test]
    async fn test_zero_buffer_size_is_rejected() {
        let config = StreamConfig::new().buffer_size(0);
        let result = StreamReader::with_config(Cursor::new(Vec::new()), config, CancellationToken::new());
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}
