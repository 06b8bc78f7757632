//! Stream multiplexer
//!
//! Turns the engine's internal event channel into the outbound stream a
//! caller consumes: one numbered [`StreamFrame`] per event, in exactly the
//! order the engine emitted them, followed by one final `stats` frame.
//!
//! Dropping the [`EventStream`] cancels the round it belongs to.

use chorus_domain::{ContextStats, DiscussionEvent, StreamFrame};
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

/// Forwarding half: owned by the round task.
pub struct StreamMultiplexer {
    frames: mpsc::Sender<StreamFrame>,
    cancel: CancellationToken,
    next_index: u64,
}

impl StreamMultiplexer {
    /// Create a multiplexer and the stream its frames arrive on.
    pub fn channel(capacity: usize, cancel: CancellationToken) -> (Self, EventStream) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let stream = EventStream {
            inner: ReceiverStream::new(rx),
            _cancel_on_drop: cancel.clone().drop_guard(),
        };
        let mux = Self {
            frames: tx,
            cancel,
            next_index: 0,
        };
        (mux, stream)
    }

    /// Forward every engine event until the engine drops its sender.
    ///
    /// Keeps draining after the consumer is gone so the engine never blocks
    /// on a full channel while it winds down.
    pub async fn forward(&mut self, mut events: mpsc::Receiver<DiscussionEvent>) -> u64 {
        let start = self.next_index;
        while let Some(event) = events.recv().await {
            self.push(event).await;
        }
        self.next_index - start
    }

    /// Emit the closing `stats` frame and close the stream.
    pub async fn finish(mut self, stats: &ContextStats) {
        self.push(DiscussionEvent::stats(stats)).await;
        debug!("Stream closed after {} frame(s)", self.next_index);
    }

    pub fn frames_sent(&self) -> u64 {
        self.next_index
    }

    async fn push(&mut self, event: DiscussionEvent) {
        let frame = StreamFrame::new(self.next_index, event);
        self.next_index += 1;
        if self.frames.send(frame).await.is_err() && !self.cancel.is_cancelled() {
            debug!("Stream consumer dropped; cancelling round");
            self.cancel.cancel();
        }
    }
}

/// Consuming half: an ordered stream of frames that ends after `stats`.
pub struct EventStream {
    inner: ReceiverStream<StreamFrame>,
    _cancel_on_drop: DropGuard,
}

impl EventStream {
    /// Wait for the next frame; `None` once the round has fully settled.
    pub async fn next_frame(&mut self) -> Option<StreamFrame> {
        futures::StreamExt::next(self).await
    }

    /// Drain the stream to completion.
    pub async fn collect_all(mut self) -> Vec<StreamFrame> {
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame().await {
            frames.push(frame);
        }
        frames
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl Stream for EventStream {
    type Item = StreamFrame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
