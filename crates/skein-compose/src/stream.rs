//! Streaming run output
//!
//! [`OutputStream`] is the consumer half of a streaming run: the run itself
//! lives in a background worker task and feeds frames through a bounded
//! channel. Dropping the stream cancels the run.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Incremental output of one run
///
/// Yields `Ok` frames for output chunks and at most one `Err` frame, always
/// last, when the run fails. After the final frame the stream is exhausted.
///
/// ```ignore
/// let mut output = runner.stream(input);
/// while let Some(frame) = output.recv().await {
///     match frame {
///         Ok(chunk) => print!("{chunk}"),
///         Err(e) => eprintln!("run failed: {e}"),
///     }
/// }
/// ```
pub struct OutputStream {
    frames: ReceiverStream<Result<Value>>,
    worker: JoinHandle<()>,
    token: CancellationToken,
}

impl OutputStream {
    pub(crate) fn new(
        rx: mpsc::Receiver<Result<Value>>,
        worker: JoinHandle<()>,
        token: CancellationToken,
    ) -> Self {
        Self {
            frames: ReceiverStream::new(rx),
            worker,
            token,
        }
    }

    /// Receive the next frame, or `None` once the run is over
    pub async fn recv(&mut self) -> Option<Result<Value>> {
        self.next().await
    }

    /// Cancel the run and discard any frames still in flight
    pub fn close(self) {}
}

impl Stream for OutputStream {
    type Item = Result<Value>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().frames).poll_next(cx)
    }
}

impl Drop for OutputStream {
    fn drop(&mut self) {
        self.token.cancel();
        self.worker.abort();
    }
}
