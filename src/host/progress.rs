//! Download progress notifications.
//!
//! Session creation may trigger a one-time model download. Progress is
//! delivered as a bounded, finite stream: the [`ProgressMonitor`] half is
//! handed to the host's `create` call, the [`ProgressStream`] half is read
//! while creation is pending. Once creation finishes the monitor is dropped
//! and the stream ends, so completion is the terminal event.
//!
//! Reporting never blocks the download: when the consumer falls behind,
//! intermediate notifications are dropped.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Default number of progress notifications buffered for a slow consumer.
pub const DEFAULT_PROGRESS_BUFFER: usize = 32;

/// One progress notification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadProgress {
    /// Fraction of the download completed, in `[0, 1]`.
    pub loaded: f64,
}

/// Sending half of a progress channel.
#[derive(Debug, Clone)]
pub struct ProgressMonitor {
    tx: mpsc::Sender<DownloadProgress>,
}

impl ProgressMonitor {
    /// Report fractional completion. Values are clamped to `[0, 1]`;
    /// non-finite values are ignored.
    pub fn report(&self, loaded: f64) {
        if !loaded.is_finite() {
            return;
        }
        let progress = DownloadProgress {
            loaded: loaded.clamp(0.0, 1.0),
        };
        // full buffer or gone consumer: drop the notification
        let _ = self.tx.try_send(progress);
    }

    /// Report `completed` out of `total` units. Ignored when `total` is zero.
    pub fn report_bytes(&self, completed: u64, total: u64) {
        if total > 0 {
            self.report(completed as f64 / total as f64);
        }
    }
}

/// Receiving half of a progress channel.
pub struct ProgressStream {
    inner: ReceiverStream<DownloadProgress>,
}

impl Stream for ProgressStream {
    type Item = DownloadProgress;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Create a bounded progress channel.
pub fn progress_channel(buffer: usize) -> (ProgressMonitor, ProgressStream) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (
        ProgressMonitor { tx },
        ProgressStream {
            inner: ReceiverStream::new(rx),
        },
    )
}
