//! Outbound frame channel.
//!
//! The bridge writes encoded frames into a bounded channel; the HTTP body drains
//! it. A full channel suspends the writer, and dropping the body (the client went
//! away) is observed by the writer as cancellation.

use std::convert::Infallible;

use bytes::Bytes;
use futures::Stream;
use tokio::sync::mpsc;

use crate::core::events::{OutboundEvent, encode_frame};

/// Frames buffered between the bridge and the HTTP body.
pub const FRAME_CHANNEL_CAPACITY: usize = 32;

/// Create a connected sink/stream pair.
pub fn frame_channel() -> (FrameSink, FrameStream) {
    let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
    (
        FrameSink {
            tx: Some(tx),
            finalized: false,
        },
        FrameStream { rx },
    )
}

/// Write side of the frame channel. Owned by exactly one bridge.
pub struct FrameSink {
    tx: Option<mpsc::Sender<Bytes>>,
    finalized: bool,
}

impl FrameSink {
    /// Encode and write one event, waiting for channel capacity.
    ///
    /// Returns false when nothing was written because the sink is finalized or
    /// the reader is gone.
    pub async fn emit(&mut self, event: OutboundEvent) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };

        if tx.send(encode_frame(&event)).await.is_err() {
            tracing::debug!(event = event.kind(), "Frame reader gone, dropping frame");
            self.tx = None;
            return false;
        }
        true
    }

    /// Write `end` (when a message is given) and close the stream.
    ///
    /// Only the first call has any effect.
    pub async fn finalize(&mut self, message: Option<&str>) {
        if self.finalized {
            return;
        }
        self.finalized = true;

        if let Some(message) = message {
            self.emit(OutboundEvent::end(message)).await;
        }
        self.tx = None;
    }

    #[cfg(test)]
    fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Resolves once the reader has gone away (or the sink no longer writes).
    pub async fn closed(&self) {
        if let Some(tx) = &self.tx {
            tx.closed().await;
        }
    }
}

/// Read side of the frame channel.
pub struct FrameStream {
    rx: mpsc::Receiver<Bytes>,
}

impl FrameStream {
    /// Frames in write order, ending when the sink is finalized or dropped.
    /// Suitable for `Body::from_stream`; dropping it signals a client disconnect.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
        let mut rx = self.rx;
        async_stream::stream! {
            while let Some(frame) = rx.recv().await {
                yield Ok(frame);
            }
        }
    }
}
